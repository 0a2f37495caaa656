//! Image-vars command - print exports for published images

use super::or_configured;
use crate::cli::args::ImageVarsArgs;
use crate::config::Config;
use crate::error::{CarryallError, CarryallResult};
use crate::sync::image_var_exports;

/// Execute the image-vars command
///
/// Output is meant for `eval`, so nothing but the exports goes to stdout.
pub async fn execute(args: ImageVarsArgs, config: &Config) -> CarryallResult<()> {
    let vars = or_configured(args.vars, &config.save.image_vars);
    if vars.is_empty() {
        return Err(CarryallError::User(
            "No image variables given; pass them or set save.image_vars".to_string(),
        ));
    }
    let registry = args.registry.or_else(|| config.publish.registry.clone());

    for line in image_var_exports(&vars, registry.as_deref(), |name| std::env::var(name).ok())? {
        println!("{}", line);
    }
    Ok(())
}
