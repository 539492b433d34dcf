//! Path rewriting applied to a matched route before forwarding.

/// Pure path → path transformation attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRewrite {
    /// Forward the path unchanged.
    Keep,
    /// Replace the leading `from` with `to`.
    ReplacePrefix { from: String, to: String },
}

impl PathRewrite {
    pub fn replace_prefix(from: impl Into<String>, to: impl Into<String>) -> Self {
        PathRewrite::ReplacePrefix {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Rewrite `path`. The result always starts with `/`.
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathRewrite::Keep => path.to_owned(),
            PathRewrite::ReplacePrefix { from, to } => match path.strip_prefix(from.as_str()) {
                Some(rest) => join(to, rest),
                None => path.to_owned(),
            },
        }
    }
}

fn join(base: &str, rest: &str) -> String {
    let joined = match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) if !rest.is_empty() => format!("{base}/{rest}"),
        _ => format!("{base}{rest}"),
    };
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}
