//! Shared names and fixed values.

/// Name of the ahead-of-time compiler executable.
pub const NATIVE_IMAGE: &str = "native-image";

/// Mount point of the build directory inside builder containers.
pub const CONTAINER_PROJECT_DIR: &str = "/project";

/// Builder image used for containerized builds unless configured otherwise.
pub const DEFAULT_BUILDER_IMAGE: &str = "quay.io/quarkus/ubi9-quarkus-mandrel-builder-image:jdk-21";

/// Exit code of a compiler killed for running out of memory.
pub const OOM_EXIT_CODE: i32 = 137;

/// File the assembled command is written to in sources-only mode.
pub const ARGS_FILE: &str = "native-image.args";

/// Name the trust store is copied to inside the build directory for containerized builds.
pub const TRUST_STORE_FILE: &str = "trustStore";

/// System property naming the trust store in user build arguments.
pub const TRUST_STORE_PROPERTY: &str = "-Djavax.net.ssl.trustStore=";

/// Directory, relative to the build directory, the compiler writes reports into.
pub const REPORTS_DIR: &str = "reports";

/// Port published for debugging the compiler process.
pub const DEBUG_BUILD_PROCESS_PORT: u16 = 5005;

/// Suffix of the build statistics file written next to the executable.
pub const BUILD_STATS_SUFFIX: &str = "-build-output-stats.json";
