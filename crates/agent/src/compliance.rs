//! Post-response compliance heuristic.

use discovery_config::ComplianceConfig;

/// Whether the reply appears to report the follow-up email as sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceVerdict {
    Confirmed,
    Uncertain,
}

impl ComplianceVerdict {
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Confirms a reply when it mentions at least one action keyword and at
/// least one completion keyword. Advisory only: it reads the text, not
/// the tool log.
#[derive(Debug, Clone)]
pub struct ComplianceClassifier {
    action: Vec<String>,
    completion: Vec<String>,
}

fn lowercase_all<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

impl ComplianceClassifier {
    pub fn new<A, C, S>(action: A, completion: C) -> Self
    where
        A: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            action: lowercase_all(action),
            completion: lowercase_all(completion),
        }
    }

    pub fn from_config(config: &ComplianceConfig) -> Self {
        Self::new(&config.action_keywords, &config.completion_keywords)
    }

    pub fn classify(&self, reply: &str) -> ComplianceVerdict {
        let text = reply.to_lowercase();
        let has = |set: &[String]| set.iter().any(|k| text.contains(k.as_str()));

        if has(&self.action) && has(&self.completion) {
            ComplianceVerdict::Confirmed
        } else {
            ComplianceVerdict::Uncertain
        }
    }
}

impl Default for ComplianceClassifier {
    fn default() -> Self {
        Self::from_config(&ComplianceConfig::default())
    }
}
