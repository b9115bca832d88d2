use std::collections::BTreeMap;

use serde_json::Value;

/// Arguments of one endpoint call.
///
/// Positional values bind to the endpoint signature in order (required
/// parameters first, then optional ones); named values bind by API parameter
/// name. A `null` value is the same as leaving the argument out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn arg_opt<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.arg(name, value),
            None => self,
        }
    }

    pub fn from_object(value: Value) -> Self {
        let mut args = Self::new();
        if let Value::Object(map) = value {
            args.named.extend(map);
        }
        args
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CallArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.named.insert(name.into(), value.into());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::CallArgs;

    use serde_json::{Value, json};

    #[test]
    fn builder_collects_positional_and_named_values() {
        let args = CallArgs::new()
            .positional(7)
            .arg("search", "name = web")
            .arg_opt("page", None::<u32>)
            .arg_opt("per_page", Some(20));

        assert_eq!(args.positional, vec![json!(7)]);
        assert_eq!(args.named.get("search"), Some(&json!("name = web")));
        assert!(!args.named.contains_key("page"));
        assert_eq!(args.named.get("per_page"), Some(&json!(20)));
    }

    #[test]
    fn from_object_ignores_non_objects() {
        let args = CallArgs::from_object(json!({ "id": 1, "host": { "name": "web" } }));
        assert_eq!(args.named.len(), 2);
        assert_eq!(CallArgs::from_object(Value::Null), CallArgs::new());
    }
}
