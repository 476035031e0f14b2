//! Compiled field extraction chains
//!
//! A [`FieldChain`] is the compiled form of a `Vec<FieldRule>`. Strategies are evaluated
//! lazily in order against an element scope and evaluation stops at the first one that
//! yields a non-empty value.

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use super::config::FieldRule;
use super::normalizer::{collapse_whitespace, normalize};
use super::{ParsingError, ParsingResult};

/// Parse a single selector
pub fn compile_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

/// Compile multiple selector strings, skipping (and logging) invalid ones.
///
/// Fails only when none of them compile.
pub fn compile_selectors(field: &str, selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match compile_selector(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector for '{}': {}", field, e);
                errors.push(e.to_string());
            }
        }
    }

    if selectors.is_empty() && !selector_strings.is_empty() {
        return Err(ParsingError::NoValidSelectors {
            field: field.to_string(),
            errors: errors.join(", "),
        });
    }
    Ok(selectors)
}

/// Compiled extraction rule
#[derive(Debug)]
pub enum Strategy {
    Text(Selector),
    OwnText(Selector),
    Attr(Selector, String),
    AttrByText {
        selector: Selector,
        attr: String,
        needle: String,
    },
    NextSibling {
        anchor: Selector,
        sibling: Selector,
    },
    Joined {
        parts: Vec<Selector>,
        separator: String,
    },
    TextStripped(Selector, Regex),
}

impl Strategy {
    pub fn compile(field: &str, rule: &FieldRule) -> ParsingResult<Self> {
        Ok(match rule {
            FieldRule::Text { selector } => Self::Text(compile_selector(selector)?),
            FieldRule::OwnText { selector } => Self::OwnText(compile_selector(selector)?),
            FieldRule::Attr { selector, attr } => Self::Attr(compile_selector(selector)?, attr.clone()),
            FieldRule::AttrByText {
                selector,
                attr,
                needle,
            } => Self::AttrByText {
                selector: compile_selector(selector)?,
                attr: attr.clone(),
                needle: needle.clone(),
            },
            FieldRule::NextSibling { selector, sibling } => Self::NextSibling {
                anchor: compile_selector(selector)?,
                sibling: compile_selector(sibling)?,
            },
            FieldRule::Joined {
                selectors,
                separator,
            } => Self::Joined {
                parts: selectors
                    .iter()
                    .map(|s| compile_selector(s))
                    .collect::<ParsingResult<_>>()?,
                separator: separator.clone(),
            },
            FieldRule::TextStripped { selector, pattern } => {
                let regex = Regex::new(pattern).map_err(|e| ParsingError::InvalidPattern {
                    field: field.to_string(),
                    reason: e.to_string(),
                })?;
                Self::TextStripped(compile_selector(selector)?, regex)
            }
        })
    }

    /// Raw candidate value within `scope`, before normalization
    pub fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        match self {
            Self::Text(selector) => scope.select(selector).next().map(element_text),
            Self::OwnText(selector) => scope.select(selector).next().map(own_text),
            Self::Attr(selector, attr) => scope
                .select(selector)
                .next()
                .and_then(|el| el.value().attr(attr))
                .map(ToString::to_string),
            Self::AttrByText {
                selector,
                attr,
                needle,
            } => scope
                .select(selector)
                .find(|el| element_text(*el).contains(needle.as_str()))
                .and_then(|el| el.value().attr(attr))
                .map(ToString::to_string),
            Self::NextSibling { anchor, sibling } => {
                let anchor = scope.select(anchor).next()?;
                let next = anchor.next_siblings().find_map(ElementRef::wrap)?;
                sibling.matches(&next).then(|| element_text(next))
            }
            Self::Joined { parts, separator } => {
                let parts: Vec<String> = parts
                    .iter()
                    .filter_map(|selector| scope.select(selector).next())
                    .filter_map(|el| normalize(Some(&element_text(el))))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(separator))
            }
            Self::TextStripped(selector, pattern) => scope
                .select(selector)
                .next()
                .map(|el| pattern.replace(&element_text(el), "").into_owned()),
        }
    }
}

/// Full text content of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text nodes that are direct children of the element
pub fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect()
}

/// Ordered extraction strategies for one field
#[derive(Debug)]
pub struct FieldChain {
    strategies: Vec<Strategy>,
}

impl FieldChain {
    /// Compile a chain. Rules that fail to compile are logged and skipped; a chain
    /// whose rules all fail is a configuration error.
    pub fn compile(field: &str, rules: &[FieldRule]) -> ParsingResult<Self> {
        let mut strategies = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            match Strategy::compile(field, rule) {
                Ok(strategy) => strategies.push(strategy),
                Err(e) => {
                    warn!("Skipping extraction rule for '{}': {}", field, e);
                    errors.push(e.to_string());
                }
            }
        }

        if strategies.is_empty() && !rules.is_empty() {
            return Err(ParsingError::NoValidSelectors {
                field: field.to_string(),
                errors: errors.join(", "),
            });
        }

        debug!(field, strategies = strategies.len(), "Compiled field chain");
        Ok(Self { strategies })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First strategy yielding a non-empty normalized value
    pub fn resolve(&self, scope: ElementRef<'_>) -> Option<String> {
        self.strategies
            .iter()
            .find_map(|strategy| normalize(strategy.extract(scope).as_deref()))
    }

    /// First strategy yielding a non-empty value, whitespace-collapsed only.
    ///
    /// For URLs and other values the doubled-text repair must not touch.
    pub fn resolve_raw(&self, scope: ElementRef<'_>) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let value = collapse_whitespace(&strategy.extract(scope)?);
            (!value.is_empty()).then_some(value)
        })
    }
}
