use anyhow::Result;
use std::path::PathBuf;

use optlock::OptionTable;

pub fn exec(options_file: PathBuf, json: bool) -> Result<()> {
    let table = OptionTable::load(&options_file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("options: {} ({})", table.len(), options_file.display());
    for (key, spec) in table.iter() {
        let opt = if spec.optional { "?" } else { "" };
        print!("  {}: {}{} = {}", key, spec.kind, opt, spec.default);
        match &spec.help {
            Some(h) => println!("  # {}", h),
            None => println!(),
        }
    }
    Ok(())
}
