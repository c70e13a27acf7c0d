use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::{Expr, Field, GenericArgument, Ident, PathArguments, Type};

use crate::diagnostics::{Diagnostics, ProducerContext, Scope};
use crate::directives::{self, Directive, DirectiveKind, Occurrence};

pub fn is_option_type(ty: &Type) -> bool {
    extract_option_inner(ty).is_some()
}

/// For `Option<T>` (also `std::option::Option<T>`), returns `T`.
pub fn extract_option_inner(ty: &Type) -> Option<&Type> {
    let path = match ty {
        Type::Path(type_path) if type_path.qself.is_none() => &type_path.path,
        _ => return None,
    };
    let segment = path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let args = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args,
        _ => return None,
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// A declared field together with its parsed directives, before any
/// validation or path resolution has happened.
pub struct FieldDescriptor {
    pub ident: Ident,
    pub ty: Type,
    pub is_optional: bool,
    pub span: Span,
    pub occurrences: Vec<Occurrence>,
}

impl FieldDescriptor {
    pub fn from_field(field: &Field) -> syn::Result<Self> {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))?;
        Ok(Self {
            ty: field.ty.clone(),
            is_optional: is_option_type(&field.ty),
            span: field.span(),
            occurrences: directives::parse_directives(&field.attrs)?,
            ident,
        })
    }
}

#[derive(Clone)]
pub struct DefaultSpec {
    pub missing: Expr,
    pub on_error: Expr,
}

/// The fully resolved coding plan for one field. Exactly one registration
/// exists per field that survived validation; every downstream stage
/// (trees, synthesizers, the key registry) consumes these and never the
/// raw directives.
pub struct Registration {
    pub ident: Ident,
    pub field_name: String,
    pub ty: Type,
    pub is_optional: bool,
    /// For `Option<T>` fields, the `T` the runtime helpers need.
    pub inner_ty: Option<Type>,
    /// Empty path = the whole-value shortcut.
    pub decode_path: Vec<String>,
    pub encode_path: Vec<String>,
    pub helper: Option<Expr>,
    pub default: Option<DefaultSpec>,
    pub skip_decode: bool,
    pub skip_encode: bool,
    /// What the constructor uses when the field is skipped from decoding.
    pub decode_replacement: Option<Expr>,
    pub span: Span,
}

impl Registration {
    pub fn decodes(&self) -> bool {
        !self.skip_decode
    }

    pub fn encodes(&self) -> bool {
        !self.skip_encode
    }

    pub fn decode_key(&self) -> Option<&str> {
        self.decode_path.last().map(String::as_str)
    }

    pub fn encode_key(&self) -> Option<&str> {
        self.encode_path.last().map(String::as_str)
    }

    /// Whether either active direction maps the field to the whole value.
    pub fn is_whole_value(&self) -> bool {
        (self.decodes() && self.decode_path.is_empty())
            || (self.encodes() && self.encode_path.is_empty())
    }

    /// The expression a synthesized `Default` impl would use, if one can
    /// be derived for this field.
    pub fn init_expr(&self) -> Option<Expr> {
        if let Some(default) = &self.default {
            return Some(default.missing.clone());
        }
        if let Some(replacement) = &self.decode_replacement {
            return Some(replacement.clone());
        }
        if self.is_optional {
            return Some(none_expr());
        }
        None
    }
}

fn none_expr() -> Expr {
    syn::parse_quote!(::core::option::Option::None)
}

/// Runs each occurrence through its kind's validator. Returns true when
/// any error finding was recorded.
pub fn validate_occurrences(
    occurrences: &[Occurrence],
    scope: Scope,
    diags: &mut Diagnostics,
) -> bool {
    let mut failed = false;
    for (index, occurrence) in occurrences.iter().enumerate() {
        let kind = occurrence.directive.kind();
        let cx = ProducerContext {
            kind,
            span: occurrence.span,
            scope,
            occurrences,
            index,
        };
        if directives::validator(kind).run(&cx, diags) {
            failed = true;
        }
    }
    failed
}

/// Folds a field's directives into a registration by the precedence rules:
/// direction-specific paths beat `at`, `at` beats `within`, `within` beats
/// the type-level scope, which beats the bare field name. Fields whose
/// directives failed validation yield no registration.
pub fn build_registration(
    desc: &FieldDescriptor,
    type_scope: &[String],
    diags: &mut Diagnostics,
) -> Option<Registration> {
    if validate_occurrences(&desc.occurrences, Scope::Field, diags) {
        return None;
    }

    let mut at: Option<Vec<String>> = None;
    let mut decode_at: Option<Vec<String>> = None;
    let mut encode_at: Option<Vec<String>> = None;
    let mut within: Option<Vec<String>> = None;
    let mut helper: Option<Expr> = None;
    let mut default: Option<DefaultSpec> = None;
    let mut skip_decode = false;
    let mut skip_encode = false;
    let mut replacement: Option<Expr> = None;
    let mut skip_span = desc.span;

    for occurrence in &desc.occurrences {
        match &occurrence.directive {
            Directive::At(segments) => at = Some(segments.clone()),
            Directive::DecodeAt(segments) => decode_at = Some(segments.clone()),
            Directive::EncodeAt(segments) => encode_at = Some(segments.clone()),
            Directive::Within(segments) => within = Some(segments.clone()),
            Directive::With(expr) => helper = Some(expr.clone()),
            Directive::Default { missing, on_error } => {
                default = Some(DefaultSpec {
                    missing: missing.clone(),
                    on_error: on_error.clone().unwrap_or_else(|| missing.clone()),
                });
            }
            Directive::Skip { decode, encode, replacement: expr } => {
                skip_decode |= decode;
                skip_encode |= encode;
                if *decode {
                    skip_span = occurrence.span;
                    if expr.is_some() {
                        replacement = expr.clone();
                    }
                }
            }
            // out-of-scope kinds were already rejected by the validators
            Directive::Tag(_) | Directive::TagType(_) | Directive::Init => {}
        }
    }

    let field_name = desc.ident.to_string();
    let base: Vec<String> = match (&at, &within) {
        (Some(path), _) => path.clone(),
        (None, Some(container)) => {
            let mut path = container.clone();
            path.push(field_name.clone());
            path
        }
        (None, None) => {
            let mut path = type_scope.to_vec();
            path.push(field_name.clone());
            path
        }
    };

    let decode_path = decode_at.unwrap_or_else(|| base.clone());
    let encode_path = encode_at.unwrap_or(base);

    let decode_replacement = if skip_decode {
        let resolved = replacement
            .or_else(|| default.as_ref().map(|d| d.missing.clone()))
            .or_else(|| desc.is_optional.then(none_expr));
        match resolved {
            Some(expr) => Some(expr),
            None => {
                diags.misuse(
                    DirectiveKind::Skip,
                    skip_span,
                    format!(
                        "skipping `{field_name}` from decoding requires a replacement \
                         expression because its type has no fallback"
                    ),
                );
                return None;
            }
        }
    } else {
        None
    };

    Some(Registration {
        ident: desc.ident.clone(),
        field_name,
        ty: desc.ty.clone(),
        is_optional: desc.is_optional,
        inner_ty: extract_option_inner(&desc.ty).cloned(),
        decode_path,
        encode_path,
        helper,
        default,
        skip_decode,
        skip_encode,
        decode_replacement,
        span: desc.span,
    })
}

pub fn build_registrations(
    descriptors: &[FieldDescriptor],
    type_scope: &[String],
    diags: &mut Diagnostics,
) -> Vec<Registration> {
    descriptors
        .iter()
        .filter_map(|desc| build_registration(desc, type_scope, diags))
        .collect()
}

/// A type-level `with` is a fallback coder: it covers every field that
/// did not name a helper of its own.
pub fn apply_type_helper(regs: &mut [Registration], helper: Option<&Expr>) {
    let Some(helper) = helper else { return };
    for reg in regs {
        if reg.helper.is_none() {
            reg.helper = Some(helper.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn registration(field: syn::Field, scope: &[&str]) -> (Option<Registration>, Diagnostics) {
        let desc = FieldDescriptor::from_field(&field).unwrap();
        let scope: Vec<String> = scope.iter().map(|s| s.to_string()).collect();
        let mut diags = Diagnostics::new();
        let reg = build_registration(&desc, &scope, &mut diags);
        (reg, diags)
    }

    #[test]
    fn bare_field_uses_its_own_name() {
        let (reg, diags) = registration(parse_quote!(count: i64), &[]);
        let reg = reg.unwrap();
        assert!(!diags.has_errors());
        assert_eq!(reg.decode_path, ["count"]);
        assert_eq!(reg.encode_path, ["count"]);
        assert!(!reg.is_optional);
    }

    #[test]
    fn type_scope_prefixes_undirected_fields() {
        let (reg, _) = registration(parse_quote!(count: i64), &["meta"]);
        assert_eq!(reg.unwrap().decode_path, ["meta", "count"]);
    }

    #[test]
    fn at_overrides_the_type_scope() {
        let (reg, _) = registration(
            parse_quote! {
                #[codable(at = "a.b")]
                count: i64
            },
            &["meta"],
        );
        assert_eq!(reg.unwrap().decode_path, ["a", "b"]);
    }

    #[test]
    fn within_keeps_the_field_key() {
        let (reg, _) = registration(
            parse_quote! {
                #[codable(within = "nested.container")]
                count: i64
            },
            &[],
        );
        let reg = reg.unwrap();
        assert_eq!(reg.decode_path, ["nested", "container", "count"]);
        assert_eq!(reg.encode_path, ["nested", "container", "count"]);
    }

    #[test]
    fn split_paths_diverge_per_direction() {
        let (reg, _) = registration(
            parse_quote! {
                #[codable(decode_at = "in.value", encode_at = "out.value")]
                value: String
            },
            &[],
        );
        let reg = reg.unwrap();
        assert_eq!(reg.decode_path, ["in", "value"]);
        assert_eq!(reg.encode_path, ["out", "value"]);
    }

    #[test]
    fn option_field_records_its_inner_type() {
        let (reg, _) = registration(parse_quote!(label: Option<String>), &[]);
        let reg = reg.unwrap();
        assert!(reg.is_optional);
        let inner = reg.inner_ty.unwrap();
        let expected: Type = parse_quote!(String);
        assert_eq!(quote::quote!(#inner).to_string(), quote::quote!(#expected).to_string());
    }

    #[test]
    fn skip_on_bare_required_field_is_rejected() {
        let (reg, diags) = registration(
            parse_quote! {
                #[codable(skip)]
                value: String
            },
            &[],
        );
        assert!(reg.is_none());
        assert!(diags.findings().iter().any(|f| f.id == "skip-misuse"));
    }

    #[test]
    fn skip_replacement_feeds_the_constructor() {
        let (reg, diags) = registration(
            parse_quote! {
                #[codable(skip = String::new())]
                value: String
            },
            &[],
        );
        assert!(!diags.has_errors());
        let reg = reg.unwrap();
        assert!(reg.skip_decode && reg.skip_encode);
        assert!(reg.decode_replacement.is_some());
    }

    #[test]
    fn skipped_option_falls_back_to_none() {
        let (reg, _) = registration(
            parse_quote! {
                #[codable(skip)]
                value: Option<String>
            },
            &[],
        );
        assert!(reg.unwrap().decode_replacement.is_some());
    }

    #[test]
    fn type_level_helper_covers_only_bare_fields() {
        let fields: [syn::Field; 2] = [
            parse_quote!(count: i64),
            parse_quote! {
                #[codable(with = Own)]
                flag: bool
            },
        ];
        let mut diags = Diagnostics::new();
        let mut regs: Vec<Registration> = fields
            .iter()
            .map(|field| {
                let desc = FieldDescriptor::from_field(field).unwrap();
                build_registration(&desc, &[], &mut diags).unwrap()
            })
            .collect();

        let fallback: Expr = parse_quote!(Shared);
        apply_type_helper(&mut regs, Some(&fallback));
        let first = regs[0].helper.clone().unwrap();
        let second = regs[1].helper.clone().unwrap();
        assert_eq!(quote::quote!(#first).to_string(), "Shared");
        assert_eq!(quote::quote!(#second).to_string(), "Own");
    }

    #[test]
    fn invalid_combination_drops_the_field() {
        let (reg, diags) = registration(
            parse_quote! {
                #[codable(at = "a", within = "b")]
                value: String
            },
            &[],
        );
        assert!(reg.is_none());
        assert!(diags.has_errors());
    }
}
