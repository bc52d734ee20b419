//! Static value generator and YAML to `Value` conversion.

use crate::error::RuleError;
use labgen_core::Value;
use serde_yaml::Value as YamlValue;

/// Convert a YAML scalar to a `Value`.
///
/// Tagged scalars are unwrapped; sequences and mappings are rejected since
/// generated columns are scalar.
pub fn yaml_to_value(yaml: &YamlValue) -> Result<Value, RuleError> {
    match yaml {
        YamlValue::Tagged(tagged) => yaml_to_value(&tagged.value),
        other => Value::try_from(other).map_err(RuleError::Other),
    }
}
