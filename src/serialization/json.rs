use crate::attributes::AttributeSet;
use crate::blob::JsonMap;
use crate::core::Result;

use super::SerializeOptions;

/// Renders native attributes passing `only`/`except`, then every `methods`
/// entry read through the record.
pub fn render_json(record: &dyn AttributeSet, options: &SerializeOptions) -> Result<JsonMap> {
    let mut out = JsonMap::new();

    for name in record.attribute_names() {
        if options.includes_attribute(&name) {
            let value = record.read_attribute(&name)?;
            out.insert(name, value.to_json());
        }
    }

    for name in &options.methods {
        out.insert(name.clone(), record.read_attribute(name)?.to_json());
    }

    Ok(out)
}
