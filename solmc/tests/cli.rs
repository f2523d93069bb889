use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use solmc_ast::Program;
use solmc_ast::build::AstBuilder;

fn temp_dir(tag: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("solmc-{tag}-{}-{ts}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn counter() -> Program {
    let b = AstBuilder::new();
    let mut c = b.contract("Counter");
    let count = b.state_var("count", b.uint(256));
    let body = vec![b.expr_stmt(b.assign(
        b.ident(&count),
        b.binary(b.ident(&count), solmc_ast::BinOp::Add, b.number(1)),
    ))];
    c.state_vars.push(count);
    c.functions.push(b.function("bump", vec![], vec![], body));
    Program { contracts: vec![c] }
}

fn write_program(dir: &Path) -> PathBuf {
    let path = dir.join("counter.json");
    let json = serde_json::to_string(&counter()).expect("serialize program");
    std::fs::write(&path, json).expect("write program");
    path
}

fn solmc(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_solmc"))
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("spawn solmc")
}

#[test]
fn translates_a_program_to_a_file() {
    let dir = temp_dir("translate");
    let input = write_program(&dir);
    let out = dir.join("model.c");

    let run = solmc(
        &["translate", input.to_str().unwrap(), "-o", out.to_str().unwrap()],
        &dir,
    );
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let model = std::fs::read_to_string(&out).unwrap();
    assert!(model.contains("#include \"sol_runtime.h\""));
    assert!(model.contains("void Counter_Method_bump(struct Counter *self, struct CallState *state)"));
    assert!(model.contains("Counter_Method_bump(&contract_0, &state);"));
}

#[test]
fn config_file_is_found_above_the_input() {
    let dir = temp_dir("config");
    std::fs::write(dir.join("solmc.toml"), "[model]\nlockstep-time = true\n").unwrap();
    let nested = dir.join("build");
    std::fs::create_dir_all(&nested).unwrap();
    let input = write_program(&nested);

    let run = solmc(&["translate", input.to_str().unwrap()], &nested);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    let model = String::from_utf8_lossy(&run.stdout);
    assert!(model.contains("next_block"));
}

#[test]
fn unknown_actor_is_a_configuration_error() {
    let dir = temp_dir("actor");
    let input = write_program(&dir);

    let run = solmc(
        &["translate", input.to_str().unwrap(), "--actor", "Vault"],
        &dir,
    );
    assert!(!run.status.success());
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("Vault"), "{stderr}");
}

#[test]
fn runtime_header_declares_the_model_primitives() {
    let dir = temp_dir("runtime");
    let run = solmc(&["runtime"], &dir);
    assert!(run.status.success());
    let header = String::from_utf8_lossy(&run.stdout);
    assert!(header.contains("sol_bool_t _pay(struct CallState *state, sol_address_t dst, sol_uint256_t amount);"));
    assert!(header.contains("sol_continue"));
}
