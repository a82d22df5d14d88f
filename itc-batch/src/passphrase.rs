use std::collections::HashMap;
use std::io;
use crate::transaction::Passphrase;

/// Source of passphrases for wallets whose CSV row carries none.
pub trait PassphrasePrompt {
    fn prompt(&mut self, address: &str) -> io::Result<String>;
}

/// Asks on the terminal with echo disabled.
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn prompt(&mut self, address: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("Enter passphrase for wallet {}\n> ", address))
    }
}

pub enum PassphraseMode {
    /// Every wallet without an explicit passphrase gets this one.
    Default(String),
    /// Ask once per wallet and remember the answer for the rest of the run.
    Prompt(Box<dyn PassphrasePrompt>),
}

pub struct PassphraseResolver {
    mode: PassphraseMode,
    known: HashMap<String, String>,
}

impl PassphraseResolver {
    pub fn new(mode: PassphraseMode) -> Self {
        PassphraseResolver { mode, known: HashMap::new() }
    }

    /// `passphrase-file` wins over `passphrase-string`; with neither the
    /// wallet's passphrase comes from `mode`.
    pub fn resolve(&mut self, from: &str, file: &str, literal: &str) -> io::Result<Passphrase> {
        if !file.is_empty() {
            return Ok(Passphrase::File(file.to_string()));
        }
        if !literal.is_empty() {
            return Ok(Passphrase::Literal(literal.to_string()));
        }
        match &mut self.mode {
            PassphraseMode::Default(default) => Ok(Passphrase::Literal(default.clone())),
            PassphraseMode::Prompt(prompt) => {
                if let Some(known) = self.known.get(from) {
                    return Ok(Passphrase::Literal(known.clone()));
                }
                let answer = prompt.prompt(from)?;
                self.known.insert(from.to_string(), answer.clone());
                Ok(Passphrase::Literal(answer))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Answers `pass-<address>` and records who was asked.
    pub(crate) struct ScriptedPrompt(pub Rc<RefCell<Vec<String>>>);

    impl PassphrasePrompt for ScriptedPrompt {
        fn prompt(&mut self, address: &str) -> io::Result<String> {
            self.0.borrow_mut().push(address.to_string());
            Ok(format!("pass-{}", address))
        }
    }

    #[test]
    fn explicit_passphrases_take_priority() {
        let mut resolver = PassphraseResolver::new(PassphraseMode::Default("dflt".to_string()));
        assert_eq!(resolver.resolve("a", "f.txt", "lit").unwrap(), Passphrase::File("f.txt".to_string()));
        assert_eq!(resolver.resolve("a", "", "lit").unwrap(), Passphrase::Literal("lit".to_string()));
        assert_eq!(resolver.resolve("a", "", "").unwrap(), Passphrase::Literal("dflt".to_string()));
    }

    #[test]
    fn prompts_once_per_wallet() {
        let asked = Rc::new(RefCell::new(Vec::new()));
        let mut resolver = PassphraseResolver::new(PassphraseMode::Prompt(Box::new(ScriptedPrompt(asked.clone()))));

        assert_eq!(resolver.resolve("a", "", "").unwrap(), Passphrase::Literal("pass-a".to_string()));
        assert_eq!(resolver.resolve("b", "", "").unwrap(), Passphrase::Literal("pass-b".to_string()));
        assert_eq!(resolver.resolve("a", "", "").unwrap(), Passphrase::Literal("pass-a".to_string()));
        assert_eq!(*asked.borrow(), vec!["a".to_string(), "b".to_string()]);
    }
}
