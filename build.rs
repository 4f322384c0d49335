pub fn main() {
    generate_version_info();
}

/// Generate version information from git tags using vergen
///
/// The version is derived from `git describe --tags --always --dirty`, e.g. `v0.1.4`,
/// `v0.1.4-2-ge930185` or `v0.1.4-dirty`.
///
/// Exposed to the crate as:
/// - `env!("VERGEN_GIT_DESCRIBE")`
/// - `env!("VERGEN_GIT_SHA")`
/// - `env!("VERGEN_BUILD_TIMESTAMP")`
fn generate_version_info() {
    use vergen_git2::{BuildBuilder, CargoBuilder, Emitter, Git2Builder};

    let build = BuildBuilder::default()
        .build_timestamp(true)
        .build()
        .expect("Failed to configure build info");

    let cargo = CargoBuilder::default()
        .target_triple(true)
        .build()
        .expect("Failed to configure cargo info");

    let git2 = Git2Builder::default()
        .describe(true, true, None)
        .sha(true)
        .build()
        .expect("Failed to configure git info");

    Emitter::default()
        .add_instructions(&build)
        .expect("Failed to add build instructions")
        .add_instructions(&cargo)
        .expect("Failed to add cargo instructions")
        .add_instructions(&git2)
        .expect("Failed to add git instructions")
        .emit()
        .expect("Failed to emit version info");
}
