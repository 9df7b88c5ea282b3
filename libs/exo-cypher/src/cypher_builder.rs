// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::warn;

use crate::{ExpressionBuilder, Parameter, Params};

pub struct CypherBuilder {
    /// The statement being built with `$name` placeholders for each parameter
    cypher: String,
    /// Values of the parameters referenced so far, in the order of first reference
    params: Params,
}

impl CypherBuilder {
    pub fn new() -> Self {
        Self {
            cypher: String::new(),
            params: Params::new(),
        }
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.cypher.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.cypher.push(c);
    }

    /// Push a space. This is a common operation, so it is provided as a separate method.
    pub fn push_space(&mut self) {
        self.cypher.push(' ');
    }

    /// Push a newline, which separates clauses of a statement.
    pub fn push_newline(&mut self) {
        self.cypher.push('\n');
    }

    /// Push an identifier (variable, label, relationship type, property key or map key).
    ///
    /// Identifiers made of letters, digits and underscores (and not starting with a digit) are
    /// pushed as is. Anything else is back-quoted, doubling any embedded back-quote, so that labels
    /// such as `Movie Genre` survive rendering.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        let s = s.as_ref();
        if is_plain_identifier(s) {
            self.cypher.push_str(s);
        } else {
            self.cypher.push('`');
            self.cypher.push_str(&s.replace('`', "``"));
            self.cypher.push('`');
        }
    }

    /// Push a parameter reference (`$name`) and record its value.
    ///
    /// A name is bound only once; binding the same name to a different value keeps the first value
    /// (names are minted by the caller, so a clash indicates a naming bug upstream).
    pub fn push_param(&mut self, param: &Parameter) {
        self.push('$');
        self.push_identifier(&param.name);

        match self.params.get(&param.name) {
            Some(existing) if existing != &param.value => {
                warn!(
                    "Parameter '{}' is bound to more than one value; keeping the first",
                    param.name
                );
            }
            Some(_) => {}
            None => {
                self.params.insert(param.name.clone(), param.value.clone());
            }
        }
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`CypherBuilder::push_elems`], which assumes
    /// that the elements implement [`ExpressionBuilder`]).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item);

            if i < len - 1 {
                self.cypher.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`.
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Get the statement text and the parameters. Calling this method should be the final step
    /// in building a statement, and thus this builder consumes the `self`.
    pub fn into_cypher(self) -> (String, Params) {
        (self.cypher, self.params)
    }
}

impl Default for CypherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    use super::*;

    #[multiplatform_test]
    fn identifiers() {
        let mut builder = CypherBuilder::new();
        builder.push_identifier("this_friends0");
        builder.push_space();
        builder.push_identifier("Movie Genre");
        builder.push_space();
        builder.push_identifier("0abc");
        builder.push_space();
        builder.push_identifier("we`ird");

        let (cypher, params) = builder.into_cypher();
        assert_eq!(cypher, "this_friends0 `Movie Genre` `0abc` `we``ird`");
        assert!(params.is_empty());
    }

    #[multiplatform_test]
    fn params_keep_first_binding() {
        let mut builder = CypherBuilder::new();
        builder.push_param(&Parameter::new("param0", json!(5)));
        builder.push_str(", ");
        builder.push_param(&Parameter::new("param0", json!(6)));
        builder.push_str(", ");
        builder.push_param(&Parameter::new("jwt", json!({"sub": "a"})));

        let (cypher, params) = builder.into_cypher();
        assert_eq!(cypher, "$param0, $param0, $jwt");
        assert_eq!(params.len(), 2);
        assert_eq!(params["param0"], json!(5));
        assert_eq!(params["jwt"], json!({"sub": "a"}));
    }
}
