use anyhow::Result;

use nativeforge_lib::config::NativeConfig;
use nativeforge_lib::consts::NATIVE_IMAGE;
use nativeforge_lib::container::resolve_runtime;
use nativeforge_lib::platform::Platform;
use nativeforge_lib::process::to_argv;
use nativeforge_lib::runner::resolve_native_image;
use nativeforge_lib::toolchain::detect;

use super::{runner_context, runtime};

pub fn cmd_info() -> Result<()> {
  println!("System:");
  match Platform::current() {
    Some(platform) => {
      println!("  Platform: {}", platform);
      println!("  Local builds target: {}", platform.build_target(false));
      println!(
        "  Container builds target: {} (image platform {})",
        platform.build_target(true),
        platform.container_platform()
      );
    }
    _ => println!("  Could not detect platform."),
  }

  let ctx = runner_context()?;
  let rt = runtime()?;

  println!("Toolchain:");
  match resolve_native_image(&NativeConfig::default(), &ctx.env, ctx.host_os) {
    Ok(path) => {
      println!("  {}: {}", NATIVE_IMAGE, path.display());
      let probe = to_argv(&[path.display().to_string(), "--version".to_string()]);
      let version = rt
        .block_on(ctx.launcher.capture(&probe, None))
        .map_err(anyhow::Error::from)
        .and_then(|captured| Ok(detect(&captured.merged())?));
      match version {
        Ok(version) => {
          println!("  Version: {}", version);
          if version.is_obsolete() {
            println!("  This toolchain is too old to build with.");
          } else if !version.is_supported() {
            println!("  This toolchain is older than the current supported release.");
          }
        }
        Err(err) => println!("  Version: unknown ({})", err),
      }
    }
    Err(err) => println!("  {}", err),
  }

  println!("Container runtime:");
  match rt.block_on(resolve_runtime(ctx.launcher.as_ref(), None)) {
    Ok(runtime) => println!("  {}", runtime),
    Err(err) => println!("  {}", err),
  }

  Ok(())
}
