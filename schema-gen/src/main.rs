use schemars::schema_for;
use thermal_map::input::EnclosureInfo;

fn main() -> anyhow::Result<()> {
    let schema = schema_for!(EnclosureInfo);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
