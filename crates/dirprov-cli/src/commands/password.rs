//! password command - generate a password under the configured policy

use super::CommandContext;
use anyhow::Result;
use dirprov_crypto::PasswordGenerator;

pub fn execute(ctx: &CommandContext, bytes: Option<usize>) -> Result<()> {
    let config = &ctx.config.password;
    let password = PasswordGenerator::new(config.policy).generate(bytes.unwrap_or(config.byte_length))?;

    if ctx.is_json() {
        return ctx.print_json(&serde_json::json!({ "password": password }));
    }
    println!("{}", password);
    Ok(())
}
