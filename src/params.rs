use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::definition::ParamDefinition;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[^>/]+/?>").expect("valid HTML tag pattern"));

pub fn url_params(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in template.split('/') {
        let Some(name) = segment.strip_prefix(':') else {
            continue;
        };
        if !name.is_empty() && !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub required: Vec<ParamDefinition>,
    pub optional: Vec<ParamDefinition>,
}

impl Signature {
    /// Merges the declared parameters with the URL markers. Markers missing
    /// from the declaration are appended as required parameters, declared ones
    /// are forced to required.
    pub fn build(url_params: &[String], declared: &[ParamDefinition]) -> Self {
        let mut merged: Vec<ParamDefinition> = Vec::new();
        let mut index_by_name: HashMap<String, usize> = HashMap::new();

        for param in declared {
            if let Some(index) = index_by_name.get(&param.name).copied() {
                merged[index] = param.clone();
            } else {
                index_by_name.insert(param.name.clone(), merged.len());
                merged.push(param.clone());
            }
        }

        for name in url_params {
            match index_by_name.get(name).copied() {
                Some(index) => merged[index].required = true,
                None => {
                    index_by_name.insert(name.clone(), merged.len());
                    merged.push(ParamDefinition::required(name.clone()));
                }
            }
        }

        let (required, optional) = merged.into_iter().partition(|param| param.required);
        Self { required, optional }
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamDefinition> {
        self.required.iter().chain(self.optional.iter())
    }

    pub fn len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params().any(|param| param.name == name)
    }
}

/// One documentation line per parameter, nested parameters as `parent[child]`.
pub fn param_doc(param: &ParamDefinition, prefix: Option<&str>) -> String {
    let description = HTML_TAG.replace_all(&param.description, "");
    let description = match description.trim() {
        "" => "<no description>",
        trimmed => trimmed,
    };

    let name = match prefix {
        Some(prefix) => format!("{prefix}[{}]", param.name),
        None => param.name.clone(),
    };

    let mut doc = format!(
        "{name}: {description}; {} ({})",
        param.validator,
        if param.required { "REQUIRED" } else { "OPTIONAL" }
    );

    for nested in &param.params {
        doc.push('\n');
        doc.push_str(&param_doc(nested, Some(&name)));
    }

    doc
}
