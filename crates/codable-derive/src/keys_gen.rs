use std::collections::HashMap;

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::Ident;

/// Interns every key string the synthesizers touch and emits one
/// `CodingKeys` enum for the whole type. Entries are deduplicated by
/// string value and listed in first-use order; symbolic name collisions
/// between distinct strings get a numeric suffix.
#[derive(Default)]
pub struct KeyRegistry {
    entries: Vec<(Ident, String)>,
    by_value: HashMap<String, usize>,
    name_counts: HashMap<String, usize>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: &str) -> Ident {
        if let Some(&index) = self.by_value.get(value) {
            return self.entries[index].0.clone();
        }
        let base = symbolic_name(value);
        let count = self.name_counts.entry(base.clone()).or_insert(0);
        *count += 1;
        let name = if *count == 1 { base } else { format!("{base}{count}") };
        let ident = Ident::new(&name, Span::call_site());
        self.by_value.insert(value.to_string(), self.entries.len());
        self.entries.push((ident.clone(), value.to_string()));
        ident
    }

    /// The `&'static str` expression the generated impls read a key from.
    pub fn key_expr(&mut self, value: &str) -> TokenStream {
        let ident = self.intern(value);
        quote! { CodingKeys::#ident.as_str() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn emit(&self) -> TokenStream {
        if self.entries.is_empty() {
            return TokenStream::new();
        }
        let idents: Vec<&Ident> = self.entries.iter().map(|(i, _)| i).collect();
        let values: Vec<&str> = self.entries.iter().map(|(_, v)| v.as_str()).collect();
        quote! {
            #[derive(Clone, Copy)]
            enum CodingKeys {
                #(#idents,)*
            }

            impl CodingKeys {
                fn as_str(self) -> &'static str {
                    match self {
                        #(CodingKeys::#idents => #values,)*
                    }
                }
            }
        }
    }
}

/// UpperCamelCase variant name for a key string. Non-alphanumeric
/// characters split words; a leading digit or a keyword collision gets
/// a `Key` prefix.
fn symbolic_name(value: &str) -> String {
    let mut out = String::new();
    let mut capitalize = true;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if capitalize {
                out.extend(c.to_uppercase());
                capitalize = false;
            } else {
                out.push(c);
            }
        } else {
            capitalize = true;
        }
    }
    // `Self` is the only keyword the UpperCamel form can produce
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) || out == "Self" {
        format!("Key{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent_per_value() {
        let mut registry = KeyRegistry::new();
        let a = registry.intern("nested");
        let b = registry.intern("nested");
        assert_eq!(a, b);
        assert_eq!(registry.entries.len(), 1);
    }

    #[test]
    fn entries_keep_first_use_order() {
        let mut registry = KeyRegistry::new();
        registry.intern("zulu");
        registry.intern("alpha");
        registry.intern("zulu");
        let order: Vec<&str> = registry.entries.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(order, ["zulu", "alpha"]);
    }

    #[test]
    fn colliding_symbolic_names_get_suffixes() {
        let mut registry = KeyRegistry::new();
        let a = registry.intern("my_key");
        let b = registry.intern("my.key");
        let c = registry.intern("myKey");
        assert_eq!(a.to_string(), "MyKey");
        assert_eq!(b.to_string(), "MyKey2");
        assert_eq!(c.to_string(), "MyKey3");
    }

    #[test]
    fn awkward_strings_still_make_valid_idents() {
        let mut registry = KeyRegistry::new();
        assert_eq!(registry.intern("2fa").to_string(), "Key2fa");
        assert_eq!(registry.intern("$meta").to_string(), "Meta");
    }

    #[test]
    fn keyword_shaped_keys_get_the_prefix() {
        let mut registry = KeyRegistry::new();
        assert_eq!(registry.intern("self").to_string(), "KeySelf");
        assert_eq!(registry.intern("Self").to_string(), "KeySelf2");
    }

    #[test]
    fn empty_registry_emits_nothing() {
        let registry = KeyRegistry::new();
        assert!(registry.emit().is_empty());
    }

    #[test]
    fn emitted_enum_maps_back_to_strings() {
        let mut registry = KeyRegistry::new();
        registry.intern("deeply");
        registry.intern("nested");
        let tokens = registry.emit().to_string();
        assert!(tokens.contains("enum CodingKeys"));
        assert!(tokens.contains("\"deeply\""));
        assert!(tokens.contains("\"nested\""));
    }
}
