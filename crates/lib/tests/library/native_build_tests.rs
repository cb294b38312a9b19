//! End-to-end native builds against a scripted compiler.

use nativeforge_lib::config::NativeConfig;
use nativeforge_lib::native::{BuildErrorKind, BuildOutput, Stage};

use crate::common::{CURRENT_BANNER, OBSOLETE_BANNER, Project};

const CALL_TREE: &str = r#"mkdir -p reports
cat > reports/call_tree_app.txt <<'TREE'
VM Entry Points
├── entry com.example.Main.main(String[]):void id=1
│   └── directly calls com.example.RemoteStore.load():void id=2 @bci=3
TREE"#;

const FAILING_CALL_PATH: &str = r#"echo 'Error: Discovered unresolved method during parsing' >&2
echo 'Call path from entry point to com.example.RemoteStore.load():' >&2
printf '\tat com.example.Worker.run(Worker.java:7)\n' >&2
echo 'Error: Image build request failed with exit status 1' >&2
exit 1"#;

#[tokio::test]
async fn noisy_build_completes_and_executable_is_moved() {
  let project = Project::new(
    CURRENT_BANNER,
    r#"i=0
while [ $i -lt 4000 ]; do
  echo "[$i/4000] analysing"
  echo "warning $i" >&2
  i=$((i+1))
done
printf 'elf' > "$last"
echo '{}' > "$last-build-output-stats.json""#,
  );

  let output = project.build(project.config()).await.unwrap();

  let BuildOutput::Image(image) = output else {
    panic!("expected an image");
  };
  assert_eq!(image.path, project.output.path().join("app-runner"));
  assert_eq!(std::fs::read(&image.path).unwrap(), b"elf");
  assert_eq!(
    image.build_stats,
    Some(project.sources_path("app-runner-build-output-stats.json"))
  );
  assert_eq!(image.version.java_feature(), 21);
  // Discarded output stays out of the error sink.
  assert!(!project.stderr.contents().contains("warning 17"));
}

#[tokio::test]
async fn compiler_receives_assembled_arguments() {
  let project = Project::new(CURRENT_BANNER, r#"printf '%s\n' "$@" > args.txt
printf 'elf' > "$last""#);
  let config = NativeConfig {
    additional_build_args: vec!["--no-fallback".to_string(), "-H:+ReportExceptionStackTraces".to_string()],
    ..project.config()
  };

  project.build(config).await.unwrap();

  let args = std::fs::read_to_string(project.sources_path("args.txt")).unwrap();
  let args: Vec<&str> = args.lines().collect();
  assert_eq!(&args[args.len() - 3..], &["-jar", "app-runner.jar", "app-runner"]);
  let internal = args.iter().position(|a| *a == "--no-fallback").unwrap();
  let user = args.iter().rposition(|a| *a == "--no-fallback").unwrap();
  assert!(internal < user);
}

#[tokio::test]
async fn call_path_is_rewritten_from_the_report() {
  let project = Project::new(CURRENT_BANNER, &format!("{}\n{}", CALL_TREE, FAILING_CALL_PATH));
  let config = NativeConfig {
    enable_reports: true,
    ..project.config()
  };

  let err = project.build(config).await.unwrap_err();

  assert_eq!(err.stage, Stage::Build);
  assert!(matches!(err.kind, BuildErrorKind::GenerationFailed { code: 1 }));
  let stderr = project.stderr.contents();
  assert!(stderr.contains("may be misleading"));
  assert!(stderr.contains("\tat com.example.RemoteStore.load():void\n\tat com.example.Main.main(String[]):void"));
  assert!(!stderr.contains("Worker.java"));
  assert!(stderr.contains("failed with exit status 1"));
}

#[tokio::test]
async fn call_path_is_kept_verbatim_without_a_report() {
  let project = Project::new(CURRENT_BANNER, FAILING_CALL_PATH);

  let err = project.build(project.config()).await.unwrap_err();

  assert_eq!(err.exit_code(), Some(1));
  let stderr = project.stderr.contents();
  let marker = stderr.find("Call path from entry point to").unwrap();
  let frame = stderr.find("\tat com.example.Worker.run(Worker.java:7)").unwrap();
  let last = stderr.find("failed with exit status 1").unwrap();
  assert!(marker < frame && frame < last);
  assert!(!stderr.contains("may be misleading"));
}

#[tokio::test]
async fn killed_compiler_is_reported_as_out_of_memory() {
  let project = Project::new(CURRENT_BANNER, "kill -9 $$");

  let err = project.build(project.config()).await.unwrap_err();

  assert!(err.is_out_of_memory());
  assert_eq!(err.exit_code(), Some(137));
}

#[tokio::test]
async fn obsolete_toolchain_is_rejected_before_compiling() {
  let project = Project::new(OBSOLETE_BANNER, "touch compiled");

  let err = project.build(project.config()).await.unwrap_err();

  assert_eq!(err.stage, Stage::VersionCheck);
  assert!(matches!(err.kind, BuildErrorKind::Obsolete { .. }));
  assert!(!project.sources_path("compiled").exists());
}

#[tokio::test]
async fn sources_only_never_runs_the_compiler() {
  let project = Project::new(OBSOLETE_BANNER, "touch compiled");
  let config = NativeConfig {
    sources_only: true,
    ..project.config()
  };

  let output = project.build(config).await.unwrap();

  let BuildOutput::Sources { args_file, .. } = output else {
    panic!("expected sources");
  };
  assert_eq!(args_file, project.sources_path("native-image.args"));
  assert!(!project.sources_path("compiled").exists());
}
