use std::sync::LazyLock;

use regex::Regex;

use crate::params::url_params;

static RESOURCE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:api|katello/api)(?:/v[12])?/(?P<resource>\w+)(?P<rest>.*)$")
        .expect("valid resource URL pattern")
});

/// Name of the resource a URL belongs to: `/api/v2/hosts/:id` is `hosts`.
pub fn resource_from_url(url: &str) -> Option<String> {
    match url {
        "/api" => return Some("api".to_string()),
        "/katello" => return Some("katello".to_string()),
        _ => {}
    }

    RESOURCE_URL
        .captures(url)
        .and_then(|captures| captures.name("resource"))
        .map(|resource| resource.as_str().to_string())
}

/// Name under which an API variant is bound in its owning resource.
///
/// A URL with more than one parameter gets a compound name built from the
/// static segments after the owning resource, with the method spliced in
/// before the last one: `/api/hosts/:host_id/interfaces/:id` with `show`
/// becomes `interfaces_show`, `/api/a/:a_id/b/:b_id/c` with `index` becomes
/// `b_index_c`. Foreign variants are prefixed with the declaring resource.
pub fn endpoint_name(url: &str, method: &str, declaring: &str, owning: &str) -> String {
    let base = if url_params(url).len() > 1 {
        compound_name(url, method)
    } else {
        method.to_string()
    };

    if declaring == owning {
        base
    } else {
        format!("{declaring}_{base}")
    }
}

pub fn global_name(owning: &str, name: &str) -> String {
    format!("{owning}_{}", name.replace('.', "_"))
}

fn compound_name(url: &str, method: &str) -> String {
    let rest = match RESOURCE_URL.captures(url) {
        Some(captures) => captures.name("rest").map_or("", |rest| rest.as_str()),
        None => url
            .trim_start_matches('/')
            .split_once('/')
            .map_or("", |(_, rest)| rest),
    };

    let segments: Vec<&str> = rest
        .split('/')
        .filter(|segment| !segment.is_empty() && !segment.starts_with(':'))
        .collect();

    match segments.split_last() {
        None => method.to_string(),
        Some((last, [])) => format!("{last}_{method}"),
        Some((last, init)) => format!("{}_{method}_{last}", init.join("_")),
    }
}
