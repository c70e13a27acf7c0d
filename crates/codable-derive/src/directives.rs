use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, ExprLit, ExprPath, ExprUnary, Lit, Type, UnOp};

use crate::diagnostics::{DiagnosticProducer, ProducerContext, Scope};

/// The closed set of recognized directive kinds. Combination and
/// duplication rules key off this, not off the parsed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    At,
    DecodeAt,
    EncodeAt,
    Within,
    With,
    Default,
    Skip,
    Tag,
    TagType,
    Init,
}

impl DirectiveKind {
    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::At => "at",
            DirectiveKind::DecodeAt => "decode_at",
            DirectiveKind::EncodeAt => "encode_at",
            DirectiveKind::Within => "within",
            DirectiveKind::With => "with",
            DirectiveKind::Default => "default",
            DirectiveKind::Skip => "skip",
            DirectiveKind::Tag => "tag",
            DirectiveKind::TagType => "tag_type",
            DirectiveKind::Init => "init",
        }
    }
}

/// Discriminator literal for an enum variant. `Null` selects the variant
/// when the tag key is absent or null under the probing strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl TagValue {
    pub fn display(&self) -> String {
        match self {
            TagValue::Null => "null".to_string(),
            TagValue::Str(s) => s.clone(),
            TagValue::Int(n) => n.to_string(),
            TagValue::Float(f) => f.to_string(),
            TagValue::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Directive {
    /// Full key path from the root; empty = the whole-value shortcut.
    At(Vec<String>),
    DecodeAt(Vec<String>),
    EncodeAt(Vec<String>),
    /// Path of the field's container; the field keeps its own key.
    Within(Vec<String>),
    /// Helper-coder expression substituted for the native decode/encode.
    With(Expr),
    Default {
        missing: Expr,
        on_error: Option<Expr>,
    },
    Skip {
        decode: bool,
        encode: bool,
        replacement: Option<Expr>,
    },
    Tag(TagValue),
    TagType(Type),
    Init,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::At(_) => DirectiveKind::At,
            Directive::DecodeAt(_) => DirectiveKind::DecodeAt,
            Directive::EncodeAt(_) => DirectiveKind::EncodeAt,
            Directive::Within(_) => DirectiveKind::Within,
            Directive::With(_) => DirectiveKind::With,
            Directive::Default { .. } => DirectiveKind::Default,
            Directive::Skip { .. } => DirectiveKind::Skip,
            Directive::Tag(_) => DirectiveKind::Tag,
            Directive::TagType(_) => DirectiveKind::TagType,
            Directive::Init => DirectiveKind::Init,
        }
    }
}

/// One parsed `#[codable(...)]` entry with its source location.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub directive: Directive,
    pub span: Span,
}

/// Parses every `#[codable(...)]` attribute on a declaration into
/// directive occurrences. Syntax problems (bad literal shapes, unknown
/// names) are hard parse errors; combination and duplication rules are
/// deferred to the diagnostic producers.
pub fn parse_directives(attrs: &[Attribute]) -> syn::Result<Vec<Occurrence>> {
    let mut occurrences: Vec<Occurrence> = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("codable") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let span = meta.path.span();

            if meta.path.is_ident("at") {
                let segments = if meta.input.peek(syn::Token![=]) {
                    parse_path_value(&meta)?
                } else {
                    Vec::new()
                };
                occurrences.push(Occurrence { directive: Directive::At(segments), span });
            } else if meta.path.is_ident("decode_at") {
                let segments = parse_path_value(&meta)?;
                occurrences.push(Occurrence { directive: Directive::DecodeAt(segments), span });
            } else if meta.path.is_ident("encode_at") {
                let segments = parse_path_value(&meta)?;
                occurrences.push(Occurrence { directive: Directive::EncodeAt(segments), span });
            } else if meta.path.is_ident("within") {
                let segments = if meta.input.peek(syn::Token![=]) {
                    parse_path_value(&meta)?
                } else {
                    Vec::new()
                };
                occurrences.push(Occurrence { directive: Directive::Within(segments), span });
            } else if meta.path.is_ident("with") {
                let expr: Expr = meta.value()?.parse()?;
                occurrences.push(Occurrence { directive: Directive::With(expr), span });
            } else if meta.path.is_ident("default") {
                let missing: Expr = meta.value()?.parse()?;
                occurrences.push(Occurrence {
                    directive: Directive::Default { missing, on_error: None },
                    span,
                });
            } else if meta.path.is_ident("on_error") {
                let expr: Expr = meta.value()?.parse()?;
                let slot = occurrences.iter_mut().rev().find_map(|occ| match &mut occ.directive {
                    Directive::Default { on_error, .. } if on_error.is_none() => Some(on_error),
                    _ => None,
                });
                match slot {
                    Some(on_error) => *on_error = Some(expr),
                    None => {
                        return Err(syn::Error::new(
                            span,
                            "`on_error` requires a preceding `default = ...`",
                        ));
                    }
                }
            } else if meta.path.is_ident("skip") {
                let replacement = parse_optional_expr(&meta)?;
                occurrences.push(Occurrence {
                    directive: Directive::Skip { decode: true, encode: true, replacement },
                    span,
                });
            } else if meta.path.is_ident("skip_decode") {
                let replacement = parse_optional_expr(&meta)?;
                occurrences.push(Occurrence {
                    directive: Directive::Skip { decode: true, encode: false, replacement },
                    span,
                });
            } else if meta.path.is_ident("skip_encode") {
                let replacement = parse_optional_expr(&meta)?;
                occurrences.push(Occurrence {
                    directive: Directive::Skip { decode: false, encode: true, replacement },
                    span,
                });
            } else if meta.path.is_ident("tag") {
                let expr: Expr = meta.value()?.parse()?;
                let value = parse_tag_expr(&expr)?;
                occurrences.push(Occurrence { directive: Directive::Tag(value), span });
            } else if meta.path.is_ident("tag_type") {
                let ty: Type = meta.value()?.parse()?;
                occurrences.push(Occurrence { directive: Directive::TagType(ty), span });
            } else if meta.path.is_ident("init") {
                occurrences.push(Occurrence { directive: Directive::Init, span });
            } else {
                return Err(syn::Error::new(
                    span,
                    format!(
                        "unknown codable attribute: {}",
                        meta.path
                            .segments
                            .iter()
                            .map(|s| s.ident.to_string())
                            .collect::<Vec<_>>()
                            .join("::")
                    ),
                ));
            }
            Ok(())
        })?;
    }

    Ok(occurrences)
}

fn parse_path_value(meta: &syn::meta::ParseNestedMeta) -> syn::Result<Vec<String>> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) = value {
        let raw = lit.value();
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let mut segments = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() {
                return Err(syn::Error::new(
                    lit.span(),
                    "key path must not contain empty segments",
                ));
            }
            segments.push(segment.to_string());
        }
        Ok(segments)
    } else {
        Err(syn::Error::new(
            value.span(),
            "expected dot-separated string literal key path",
        ))
    }
}

fn parse_optional_expr(meta: &syn::meta::ParseNestedMeta) -> syn::Result<Option<Expr>> {
    if meta.input.peek(syn::Token![=]) {
        Ok(Some(meta.value()?.parse()?))
    } else {
        Ok(None)
    }
}

fn parse_tag_expr(expr: &Expr) -> syn::Result<TagValue> {
    match expr {
        Expr::Path(ExprPath { path, .. }) if path.is_ident("null") => Ok(TagValue::Null),
        Expr::Lit(ExprLit { lit, .. }) => parse_tag_lit(lit),
        Expr::Unary(ExprUnary { op: UnOp::Neg(_), expr, .. }) => match &**expr {
            Expr::Lit(ExprLit { lit, .. }) => parse_negated_tag_lit(lit),
            other => Err(syn::Error::new(
                other.span(),
                "expected numeric literal for `tag`",
            )),
        },
        _ => Err(syn::Error::new(
            expr.span(),
            "expected literal or `null` for `tag`",
        )),
    }
}

fn parse_tag_lit(lit: &Lit) -> syn::Result<TagValue> {
    match lit {
        Lit::Str(lit) => Ok(TagValue::Str(lit.value())),
        Lit::Int(lit) => Ok(TagValue::Int(lit.base10_parse()?)),
        Lit::Float(lit) => Ok(TagValue::Float(lit.base10_parse()?)),
        Lit::Bool(lit) => Ok(TagValue::Bool(lit.value())),
        _ => Err(syn::Error::new(
            lit.span(),
            "expected string, int, float, or bool literal for `tag`",
        )),
    }
}

fn parse_negated_tag_lit(lit: &Lit) -> syn::Result<TagValue> {
    match lit {
        Lit::Int(lit) => Ok(TagValue::Int(-lit.base10_parse::<i64>()?)),
        Lit::Float(lit) => Ok(TagValue::Float(-lit.base10_parse::<f64>()?)),
        _ => Err(syn::Error::new(
            lit.span(),
            "expected numeric literal for `tag`",
        )),
    }
}

/// The validation rules each directive kind enforces, expressed with the
/// diagnostic engine's producer combinators.
pub fn validator(kind: DirectiveKind) -> DiagnosticProducer {
    match kind {
        DirectiveKind::At => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field, Scope::Type]),
            DiagnosticProducer::cant_duplicate(),
            DiagnosticProducer::cant_be_combined_with(DirectiveKind::Within),
            DiagnosticProducer::cant_be_combined_with(DirectiveKind::DecodeAt),
            DiagnosticProducer::cant_be_combined_with(DirectiveKind::EncodeAt),
        ]),
        DirectiveKind::DecodeAt | DirectiveKind::EncodeAt => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field]),
            DiagnosticProducer::cant_duplicate(),
            DiagnosticProducer::cant_be_combined_with(DirectiveKind::At),
        ]),
        DirectiveKind::Within => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field]),
            DiagnosticProducer::cant_duplicate(),
            DiagnosticProducer::cant_be_combined_with(DirectiveKind::At),
            DiagnosticProducer::non_empty_path(),
        ]),
        DirectiveKind::With => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field, Scope::Type]),
            DiagnosticProducer::cant_duplicate(),
            // a one-direction skip still uses the helper for the other
            DiagnosticProducer::when(
                siblings_skip_both,
                DiagnosticProducer::cant_be_combined_with(DirectiveKind::Skip),
            ),
        ]),
        DirectiveKind::Default => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field]),
            DiagnosticProducer::cant_duplicate(),
            // the default guides decoding, so only a decode-covering
            // skip conflicts with it
            DiagnosticProducer::when(
                siblings_skip_decode,
                DiagnosticProducer::cant_be_combined_with(DirectiveKind::Skip),
            ),
        ]),
        DirectiveKind::Skip => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Field]),
            DiagnosticProducer::no_overlapping_skip(),
            DiagnosticProducer::when(
                self_skips_both,
                DiagnosticProducer::cant_be_combined_with(DirectiveKind::With),
            ),
            DiagnosticProducer::when(
                self_skips_decode,
                DiagnosticProducer::cant_be_combined_with(DirectiveKind::Default),
            ),
        ]),
        DirectiveKind::Tag => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Variant]),
            DiagnosticProducer::cant_duplicate(),
        ]),
        DirectiveKind::TagType => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Type]),
            DiagnosticProducer::cant_duplicate(),
            DiagnosticProducer::must_be_combined_with(DirectiveKind::At),
        ]),
        DirectiveKind::Init => DiagnosticProducer::all(vec![
            DiagnosticProducer::allowed_in(&[Scope::Type]),
            DiagnosticProducer::cant_duplicate(),
        ]),
    }
}

fn skip_coverage(cx: &ProducerContext<'_>) -> (bool, bool) {
    cx.occurrences
        .iter()
        .fold((false, false), |(d, e), occ| match occ.directive {
            Directive::Skip { decode, encode, .. } => (d || decode, e || encode),
            _ => (d, e),
        })
}

fn siblings_skip_decode(cx: &ProducerContext<'_>) -> bool {
    skip_coverage(cx).0
}

fn siblings_skip_both(cx: &ProducerContext<'_>) -> bool {
    let (decode, encode) = skip_coverage(cx);
    decode && encode
}

fn self_skips_decode(cx: &ProducerContext<'_>) -> bool {
    matches!(
        cx.occurrences[cx.index].directive,
        Directive::Skip { decode: true, .. }
    )
}

fn self_skips_both(cx: &ProducerContext<'_>) -> bool {
    matches!(
        cx.occurrences[cx.index].directive,
        Directive::Skip { decode: true, encode: true, .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn field_occurrences(field: syn::Field) -> Vec<Occurrence> {
        parse_directives(&field.attrs).unwrap()
    }

    #[test]
    fn parses_dotted_path() {
        let field: syn::Field = parse_quote! {
            #[codable(at = "deeply.nested.key")]
            value: String
        };
        let occ = field_occurrences(field);
        assert_eq!(occ.len(), 1);
        match &occ[0].directive {
            Directive::At(segments) => assert_eq!(segments, &["deeply", "nested", "key"]),
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn bare_at_is_the_whole_value_path() {
        let field: syn::Field = parse_quote! {
            #[codable(at)]
            value: String
        };
        match &field_occurrences(field)[0].directive {
            Directive::At(segments) => assert!(segments.is_empty()),
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn empty_segment_is_rejected() {
        let field: syn::Field = parse_quote! {
            #[codable(at = "a..b")]
            value: String
        };
        assert!(parse_directives(&field.attrs).is_err());
    }

    #[test]
    fn default_with_on_error_pairs_up() {
        let field: syn::Field = parse_quote! {
            #[codable(default = "some".to_string(), on_error = "another".to_string())]
            value: String
        };
        match &field_occurrences(field)[0].directive {
            Directive::Default { on_error, .. } => assert!(on_error.is_some()),
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn orphan_on_error_is_a_parse_error() {
        let field: syn::Field = parse_quote! {
            #[codable(on_error = 1)]
            value: i64
        };
        assert!(parse_directives(&field.attrs).is_err());
    }

    #[test]
    fn tag_accepts_null_and_negative_literals() {
        let variant: syn::Variant = parse_quote! {
            #[codable(tag = null)]
            Unknown
        };
        match &parse_directives(&variant.attrs).unwrap()[0].directive {
            Directive::Tag(TagValue::Null) => {}
            other => panic!("unexpected directive: {other:?}"),
        }

        let variant: syn::Variant = parse_quote! {
            #[codable(tag = -3)]
            Low
        };
        match &parse_directives(&variant.attrs).unwrap()[0].directive {
            Directive::Tag(TagValue::Int(-3)) => {}
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn unknown_directive_is_a_parse_error() {
        let field: syn::Field = parse_quote! {
            #[codable(rename = "x")]
            value: String
        };
        assert!(parse_directives(&field.attrs).is_err());
    }
}
