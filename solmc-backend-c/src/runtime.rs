#![forbid(unsafe_code)]

/// Name of the header every generated model includes.
pub const RUNTIME_HEADER: &str = "sol_runtime.h";

fn storage_type(signed: bool, bits: u16) -> &'static str {
    match (signed, bits) {
        (false, 0..=8) => "uint8_t",
        (false, 9..=16) => "uint16_t",
        (false, 17..=32) => "uint32_t",
        (false, 33..=64) => "uint64_t",
        (false, _) => "unsigned __int128",
        (true, 0..=8) => "int8_t",
        (true, 9..=16) => "int16_t",
        (true, 17..=32) => "int32_t",
        (true, 33..=64) => "int64_t",
        (true, _) => "__int128",
    }
}

fn push_scalar(out: &mut String, name: &str, storage: &str) {
    out.push_str(&format!("typedef {storage} {name};\n"));
    out.push_str(&format!("#define Init_{name}(v) (({name})(v))\n"));
}

/// Declarations the generated model links against: scalar typedefs with
/// their `Init_*` constructors, the nondeterminism primitives, and the
/// verification hooks. Definitions are supplied by the verification
/// backend's library.
pub fn runtime_header() -> String {
    let mut out = String::new();
    out.push_str("#pragma once\n");
    out.push_str("#include <stdint.h>\n\n");

    out.push_str("// ---- scalars ----\n\n");
    push_scalar(&mut out, "sol_bool_t", "uint8_t");
    push_scalar(&mut out, "sol_address_t", "uint64_t");
    for bits in (8..=256u16).step_by(8) {
        push_scalar(&mut out, &format!("sol_uint{bits}_t"), storage_type(false, bits));
        push_scalar(&mut out, &format!("sol_int{bits}_t"), storage_type(true, bits));
    }
    out.push('\n');

    out.push_str("// ---- nondeterminism ----\n\n");
    out.push_str("uint64_t nd_range(uint64_t lo, uint64_t hi, const char *msg);\n");
    out.push_str("uint8_t nd_byte(const char *msg);\n");
    out.push_str(
        "sol_uint256_t nd_increase(sol_uint256_t curr, sol_bool_t strict, const char *msg);\n",
    );
    for bits in (8..=256u16).step_by(8) {
        out.push_str(&format!(
            "{} nd_uint{bits}_t(const char *msg);\n",
            storage_type(false, bits)
        ));
        out.push_str(&format!(
            "{} nd_int{bits}_t(const char *msg);\n",
            storage_type(true, bits)
        ));
    }
    out.push('\n');

    out.push_str("// ---- verification hooks ----\n\n");
    out.push_str("struct CallState;\n");
    out.push_str("void assume(sol_bool_t cond);\n");
    out.push_str("void assert(sol_bool_t cond);\n");
    out.push_str("sol_bool_t sol_continue(void);\n");
    out.push_str("void smartace_log(const char *msg);\n");
    out.push_str("sol_bool_t _pay(struct CallState *state, sol_address_t dst, sol_uint256_t amount);\n");
    out
}
