//! Maps an outbound call's target to a logical service name.
//!
//! Rules are evaluated in declaration order and the first match wins.

use std::fmt;

use regex::Regex;

/// Anything that can decide whether a call target belongs to a service.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn matches(&self, target: &str) -> bool;
}

impl Matcher for Regex {
    fn matches(&self, target: &str) -> bool {
        self.is_match(target)
    }
}

/// Matches targets starting with a fixed string, e.g. a base URL.
#[derive(Debug, Clone)]
pub struct PrefixMatcher(pub String);

impl Matcher for PrefixMatcher {
    fn matches(&self, target: &str) -> bool {
        target.starts_with(&self.0)
    }
}

/// Matches one exact target.
#[derive(Debug, Clone)]
pub struct ExactMatcher(pub String);

impl Matcher for ExactMatcher {
    fn matches(&self, target: &str) -> bool {
        target == self.0
    }
}

#[derive(Debug)]
pub struct ServiceRule {
    pub name: String,
    pub matcher: Box<dyn Matcher>,
}

impl ServiceRule {
    pub fn new(name: impl Into<String>, matcher: impl Matcher + 'static) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
        }
    }
}

/// Ordered, immutable rule list.
#[derive(Debug, Default)]
pub struct Classifier {
    rules: Vec<ServiceRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ServiceRule>) -> Self {
        Self { rules }
    }

    pub fn rule(mut self, name: impl Into<String>, matcher: impl Matcher + 'static) -> Self {
        self.rules.push(ServiceRule::new(name, matcher));
        self
    }

    pub fn classify(&self, target: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(target))
            .map(|rule| rule.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blogs() -> Regex {
        Regex::new(r"^https?://blogs\.ft\.com").unwrap()
    }

    #[test]
    fn regex_rule_matches() {
        let classifier = Classifier::default().rule("blogs", blogs());
        assert_eq!(classifier.classify("https://blogs.ft.com/tech"), Some("blogs"));
        assert_eq!(classifier.classify("http://blogs.ft.com"), Some("blogs"));
        assert_eq!(classifier.classify("https://www.ft.com"), None);
    }

    #[test]
    fn first_declared_rule_wins() {
        let classifier = Classifier::default()
            .rule("blogs", blogs())
            .rule("everything", PrefixMatcher("https://".into()));

        assert_eq!(classifier.classify("https://blogs.ft.com"), Some("blogs"));
        assert_eq!(classifier.classify("https://www.ft.com"), Some("everything"));
    }

    #[test]
    fn mixed_matcher_kinds() {
        let classifier = Classifier::new(vec![
            ServiceRule::new("health", ExactMatcher("http://api.local/__health".into())),
            ServiceRule::new("api", PrefixMatcher("http://api.local/".into())),
        ]);

        assert_eq!(classifier.classify("http://api.local/__health"), Some("health"));
        assert_eq!(classifier.classify("http://api.local/__health?x=1"), Some("api"));
        assert_eq!(classifier.len(), 2);
    }

    #[test]
    fn empty_classifier_matches_nothing() {
        assert!(Classifier::default().is_empty());
        assert_eq!(Classifier::default().classify("anything"), None);
    }
}
