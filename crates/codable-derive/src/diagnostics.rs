use proc_macro2::{Span, TokenStream};

use crate::directives::{Directive, DirectiveKind, Occurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Where a directive occurrence was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Field,
    Variant,
    Type,
}

impl Scope {
    fn describe(self) -> &'static str {
        match self {
            Scope::Field => "a field",
            Scope::Variant => "an enum variant",
            Scope::Type => "the type",
        }
    }
}

/// A single validation finding. Errors suppress member emission; warnings
/// are advisory and kept for inspection only.
#[derive(Debug, Clone)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub fix: Option<String>,
}

/// Collects findings across the whole expansion. Validation succeeds
/// exactly when no error-severity finding was recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    findings: Vec<Finding>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn misuse(&mut self, kind: DirectiveKind, span: Span, message: impl Into<String>) {
        self.findings.push(Finding {
            id: format!("{}-misuse", kind.name()),
            severity: Severity::Error,
            message: message.into(),
            span,
            fix: Some(format!("remove the `{}` attribute", kind.name())),
        });
    }

    pub fn advisory(&mut self, kind: DirectiveKind, span: Span, message: impl Into<String>) {
        self.findings.push(Finding {
            id: format!("{}-unused", kind.name()),
            severity: Severity::Warning,
            message: message.into(),
            span,
            fix: Some(format!("remove the `{}` attribute", kind.name())),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Error).count()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Folds every error finding into a single token stream of
    /// `compile_error!` invocations, each anchored at its own span.
    pub fn to_compile_errors(&self) -> Option<TokenStream> {
        let mut combined: Option<syn::Error> = None;
        for finding in &self.findings {
            if finding.severity != Severity::Error {
                continue;
            }
            let text = match &finding.fix {
                Some(fix) => format!("{}: {} ({})", finding.id, finding.message, fix),
                None => format!("{}: {}", finding.id, finding.message),
            };
            let error = syn::Error::new(finding.span, text);
            match &mut combined {
                Some(acc) => acc.combine(error),
                None => combined = Some(error),
            }
        }
        combined.map(|e| e.to_compile_error())
    }
}

/// The directive occurrence a producer is currently judging, together
/// with its siblings on the same declaration.
pub struct ProducerContext<'a> {
    pub kind: DirectiveKind,
    pub span: Span,
    pub scope: Scope,
    pub occurrences: &'a [Occurrence],
    pub index: usize,
}

type Check = dyn Fn(&ProducerContext<'_>, &mut Diagnostics) -> bool;

/// A composable validation rule. Running a producer records findings and
/// reports whether any of them was an error.
pub struct DiagnosticProducer {
    check: Box<Check>,
}

impl DiagnosticProducer {
    fn new(check: impl Fn(&ProducerContext<'_>, &mut Diagnostics) -> bool + 'static) -> Self {
        Self { check: Box::new(check) }
    }

    pub fn run(&self, cx: &ProducerContext<'_>, diags: &mut Diagnostics) -> bool {
        (self.check)(cx, diags)
    }

    /// Runs every producer, unconditionally, and reports whether any errored.
    pub fn all(producers: Vec<DiagnosticProducer>) -> Self {
        Self::new(move |cx, diags| {
            let mut failed = false;
            for producer in &producers {
                if producer.run(cx, diags) {
                    failed = true;
                }
            }
            failed
        })
    }

    /// Gates another producer on a predicate over the same context.
    pub fn when(
        pred: fn(&ProducerContext<'_>) -> bool,
        producer: DiagnosticProducer,
    ) -> Self {
        Self::new(move |cx, diags| pred(cx) && producer.run(cx, diags))
    }

    /// The directive is only meaningful in the listed scopes.
    pub fn allowed_in(scopes: &'static [Scope]) -> Self {
        Self::new(move |cx, diags| {
            if scopes.contains(&cx.scope) {
                return false;
            }
            let allowed = scopes
                .iter()
                .map(|s| s.describe())
                .collect::<Vec<_>>()
                .join(" or ");
            diags.misuse(
                cx.kind,
                cx.span,
                format!(
                    "`{}` is not valid on {}; it applies to {}",
                    cx.kind.name(),
                    cx.scope.describe(),
                    allowed
                ),
            );
            true
        })
    }

    /// Every occurrence after the first of the same kind is an error.
    pub fn cant_duplicate() -> Self {
        Self::new(|cx, diags| {
            let duplicated = cx.occurrences[..cx.index]
                .iter()
                .any(|occ| occ.directive.kind() == cx.kind);
            if !duplicated {
                return false;
            }
            diags.misuse(
                cx.kind,
                cx.span,
                format!("`{}` may appear at most once per declaration", cx.kind.name()),
            );
            true
        })
    }

    pub fn cant_be_combined_with(other: DirectiveKind) -> Self {
        Self::new(move |cx, diags| {
            let conflicting = cx
                .occurrences
                .iter()
                .enumerate()
                .any(|(i, occ)| i != cx.index && occ.directive.kind() == other);
            if !conflicting {
                return false;
            }
            diags.misuse(
                cx.kind,
                cx.span,
                format!("`{}` cannot be combined with `{}`", cx.kind.name(), other.name()),
            );
            true
        })
    }

    pub fn must_be_combined_with(other: DirectiveKind) -> Self {
        Self::new(move |cx, diags| {
            let present = cx.occurrences.iter().any(|occ| occ.directive.kind() == other);
            if present {
                return false;
            }
            diags.misuse(
                cx.kind,
                cx.span,
                format!("`{}` requires a `{}` attribute on the same declaration", cx.kind.name(), other.name()),
            );
            true
        })
    }

    /// A container path with zero segments changes nothing; advisory only.
    pub fn non_empty_path() -> Self {
        Self::new(|cx, diags| {
            let empty = matches!(
                &cx.occurrences[cx.index].directive,
                Directive::Within(segments) if segments.is_empty()
            );
            if empty {
                diags.advisory(
                    cx.kind,
                    cx.span,
                    "an empty container path has no effect",
                );
            }
            false
        })
    }

    /// Two skip directives may coexist only when they cover disjoint
    /// directions (`skip_decode` next to `skip_encode`).
    pub fn no_overlapping_skip() -> Self {
        Self::new(|cx, diags| {
            let (decode, encode) = match &cx.occurrences[cx.index].directive {
                Directive::Skip { decode, encode, .. } => (*decode, *encode),
                _ => return false,
            };
            let overlapping = cx.occurrences[..cx.index].iter().any(|occ| {
                matches!(
                    &occ.directive,
                    Directive::Skip { decode: d, encode: e, .. }
                        if (decode && *d) || (encode && *e)
                )
            });
            if !overlapping {
                return false;
            }
            diags.misuse(
                cx.kind,
                cx.span,
                "this skip overlaps an earlier skip in the same direction",
            );
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::{parse_directives, validator};
    use syn::parse_quote;

    fn validate_field(field: syn::Field) -> Diagnostics {
        let occurrences = parse_directives(&field.attrs).unwrap();
        let mut diags = Diagnostics::new();
        for (index, occ) in occurrences.iter().enumerate() {
            let kind = occ.directive.kind();
            let cx = ProducerContext {
                kind,
                span: occ.span,
                scope: Scope::Field,
                occurrences: &occurrences,
                index,
            };
            validator(kind).run(&cx, &mut diags);
        }
        diags
    }

    #[test]
    fn clean_field_has_no_findings() {
        let diags = validate_field(parse_quote! {
            #[codable(at = "a.b", default = 0)]
            value: i64
        });
        assert!(!diags.has_errors());
        assert!(diags.findings().is_empty());
    }

    #[test]
    fn duplicated_at_plus_within_aggregates_findings() {
        let diags = validate_field(parse_quote! {
            #[codable(at = "a", at = "b", within = "c")]
            value: i64
        });
        // both `at`s conflict with `within`, the second `at` is also a
        // duplicate, and `within` conflicts back: all reported at once
        assert!(diags.error_count() >= 3);
        assert!(diags.findings().iter().any(|f| f.id == "at-misuse"));
        assert!(diags.findings().iter().any(|f| f.id == "within-misuse"));
    }

    #[test]
    fn skip_conflicts_with_default() {
        let diags = validate_field(parse_quote! {
            #[codable(skip, default = 1)]
            value: i64
        });
        assert!(diags.has_errors());
        assert!(diags.findings().iter().any(|f| f.id == "skip-misuse"));
        assert!(diags.findings().iter().any(|f| f.id == "default-misuse"));
    }

    #[test]
    fn encode_only_skip_coexists_with_default() {
        let diags = validate_field(parse_quote! {
            #[codable(skip_encode, default = 1)]
            value: i64
        });
        assert!(!diags.has_errors());
    }

    #[test]
    fn one_direction_skip_coexists_with_a_helper() {
        let diags = validate_field(parse_quote! {
            #[codable(skip_decode = 0, with = SomeCoder)]
            value: i64
        });
        assert!(!diags.has_errors());
    }

    #[test]
    fn full_skip_conflicts_with_a_helper() {
        let diags = validate_field(parse_quote! {
            #[codable(skip, with = SomeCoder)]
            value: i64
        });
        assert!(diags.has_errors());
        assert!(diags.findings().iter().any(|f| f.id == "with-misuse"));
    }

    #[test]
    fn disjoint_skips_are_allowed() {
        let diags = validate_field(parse_quote! {
            #[codable(skip_decode = 0, skip_encode)]
            value: i64
        });
        assert!(!diags.has_errors());
    }

    #[test]
    fn overlapping_skips_are_not() {
        let diags = validate_field(parse_quote! {
            #[codable(skip, skip_encode)]
            value: i64
        });
        assert!(diags.has_errors());
    }

    #[test]
    fn empty_within_is_advisory_only() {
        let diags = validate_field(parse_quote! {
            #[codable(within)]
            value: i64
        });
        assert!(!diags.has_errors());
        assert!(diags.findings().iter().any(|f| f.id == "within-unused"));
    }

    #[test]
    fn tag_on_a_field_is_out_of_scope() {
        let diags = validate_field(parse_quote! {
            #[codable(tag = "x")]
            value: i64
        });
        assert!(diags.has_errors());
        assert!(diags.findings().iter().any(|f| f.id == "tag-misuse"));
    }
}
