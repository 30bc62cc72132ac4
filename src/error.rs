use std::io::{Write, stderr};
use std::panic;

use color_eyre::eyre::Result;

/// Installs color-eyre reports for errors and panics.
///
/// Panics inside worker tasks are recovered by the harness; the hook still
/// reports them so the cause is visible.
pub fn install_hooks() -> Result<()> {
    let hook_builder = color_eyre::config::HookBuilder::default().display_env_section(false);
    let (panic_hook, eyre_hook) = hook_builder.into_hooks();
    eyre_hook.install()?;

    panic::set_hook(Box::new(move |panic_info| {
        let _ = writeln!(stderr().lock(), "{}", panic_hook.panic_report(panic_info));
    }));

    Ok(())
}
