//! Version command

/// Run the version command.
pub fn run() {
    println!("ecs-rollout {}", env!("CARGO_PKG_VERSION"));
}
