/// What an irreversible action would touch, for consent purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionScope {
    /// A single category, e.g. "remove version-manager interpreters".
    Scoped { description: String },
    /// Full reset. Only the literal token `yes` authorizes it.
    Nuclear,
}

impl ActionScope {
    pub fn scoped(description: impl Into<String>) -> Self {
        Self::Scoped {
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Denied,
}

impl Authorization {
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

/// Supplies operator answers. The terminal reads stdin; tests inject a closure.
/// `None` means no answer could be obtained (closed input).
pub trait ConsentSource {
    fn respond(&mut self, prompt: &str) -> Option<String>;
}

impl<F> ConsentSource for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn respond(&mut self, prompt: &str) -> Option<String> {
        self(prompt)
    }
}

/// Asks for consent on every call; nothing is remembered between calls.
pub struct ConfirmationGate<S> {
    source: S,
}

impl<S: ConsentSource> ConfirmationGate<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn authorize(&mut self, scope: &ActionScope) -> Authorization {
        match self.source.respond(&prompt_text(scope)) {
            Some(response) => evaluate_response(scope, &response),
            None => Authorization::Denied,
        }
    }
}

pub fn prompt_text(scope: &ActionScope) -> String {
    match scope {
        ActionScope::Scoped { description } => format!("{description}. Continue? [y/N] "),
        ActionScope::Nuclear => {
            "This resets the entire Python toolchain. Type 'yes' to continue: ".to_string()
        }
    }
}

pub fn evaluate_response(scope: &ActionScope, response: &str) -> Authorization {
    let answer = response.trim();
    let accepted = match scope {
        ActionScope::Scoped { .. } => {
            answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
        }
        ActionScope::Nuclear => answer == "yes",
    };
    if accepted {
        Authorization::Authorized
    } else {
        Authorization::Denied
    }
}
