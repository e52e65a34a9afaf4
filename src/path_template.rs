//! Parsing of `google.api.http` path templates.
//!
//! A template such as `/v1/{name=shelves/*}/books/{book.id}` is converted to the OpenAPI
//! path `/v1/{name}/books/{book.id}`; the variables `name` and `book.id` are field paths
//! into the request message.

/// A parsed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    /// Path in OpenAPI `{param}` form
    pub path: String,
    /// Field paths of the template variables, in order of appearance
    pub variables: Vec<String>,
}

impl PathTemplate {
    /// Parse a template, returning a human-readable message on failure
    pub fn parse(template: &str) -> Result<Self, String> {
        if !template.starts_with('/') {
            return Err(format!("path template {:?} must start with '/'", template));
        }

        let mut path = String::with_capacity(template.len());
        let mut variables = Vec::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(format!(
                                    "nested '{{' in path template {:?}",
                                    template
                                ))
                            }
                            _ => body.push(c),
                        }
                    }
                    if !closed {
                        return Err(format!("unclosed '{{' in path template {:?}", template));
                    }

                    let field_path = body.split('=').next().unwrap_or_default().trim();
                    if field_path.is_empty() {
                        return Err(format!("empty variable in path template {:?}", template));
                    }
                    if variables.iter().any(|v| v == field_path) {
                        return Err(format!(
                            "variable {:?} bound twice in path template {:?}",
                            field_path, template
                        ));
                    }

                    path.push('{');
                    path.push_str(field_path);
                    path.push('}');
                    variables.push(field_path.to_string());
                }
                '}' => {
                    return Err(format!("unmatched '}}' in path template {:?}", template));
                }
                _ => path.push(c),
            }
        }

        Ok(Self { path, variables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let template = PathTemplate::parse("/v1/shelves").unwrap();
        assert_eq!(template.path, "/v1/shelves");
        assert!(template.variables.is_empty());
    }

    #[test]
    fn test_simple_variables() {
        let template = PathTemplate::parse("/v1/shelves/{shelf}/books/{book.id}").unwrap();
        assert_eq!(template.path, "/v1/shelves/{shelf}/books/{book.id}");
        assert_eq!(template.variables, vec!["shelf", "book.id"]);
    }

    #[test]
    fn test_variable_with_pattern() {
        let template = PathTemplate::parse("/v1/{name=shelves/*/books/*}:archive").unwrap();
        assert_eq!(template.path, "/v1/{name}:archive");
        assert_eq!(template.variables, vec!["name"]);
    }

    #[test]
    fn test_malformed_templates() {
        assert!(PathTemplate::parse("v1/shelves").is_err());
        assert!(PathTemplate::parse("/v1/{shelf").is_err());
        assert!(PathTemplate::parse("/v1/shelf}").is_err());
        assert!(PathTemplate::parse("/v1/{}").is_err());
        assert!(PathTemplate::parse("/v1/{a}/{a}").is_err());
        assert!(PathTemplate::parse("/v1/{a{b}}").is_err());
    }
}
