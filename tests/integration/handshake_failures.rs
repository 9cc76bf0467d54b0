//! Handshake failure paths (spec §4.D/§4.E), through the public facade.

use mqi_client::{Engine, EngineOptions};
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn wrong_password_is_rejected() {
    init_tracing();
    let exe = env!("CARGO_BIN_EXE_fake-engine");
    let engine = Engine::launch(
        EngineOptions::new()
            .engine_executable_path(exe)
            .password("whatever")
            .extra_args(["--scenario=bad_password"]),
    )
    .expect("engine should launch even though the handshake will fail");

    let err = engine
        .open_session()
        .expect_err("mismatched password should be rejected");
    assert!(matches!(err, mqi_client::Error::AuthenticationFailed));
}

#[test]
fn unresolvable_executable_fails_launch() {
    init_tracing();
    let err = Engine::launch(
        EngineOptions::new()
            .engine_executable_path("/nonexistent/path/to/engine-that-does-not-exist")
            .startup_timeout(Duration::from_millis(200)),
    )
    .expect_err("spawning a nonexistent executable must fail");
    assert!(matches!(err, mqi_client::Error::LaunchFailed(_)));
}
