use std::path::Path;

use surge_core::SurgeConfig;

pub fn run(output: Option<&Path>) -> anyhow::Result<()> {
    let scaffold = SurgeConfig::default().to_toml_string()?;

    match output {
        Some(path) => {
            std::fs::write(path, &scaffold)?;
            println!("✓ Generated {}", path.display());
        }
        None => print!("{scaffold}"),
    }

    Ok(())
}
