use std::fmt;

/// SASL mechanisms the client can speak, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    pub const SUPPORTED: [Mechanism; 2] = [Mechanism::Plain, Mechanism::Login];

    /// The mechanism name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|mech| mech.name().eq_ignore_ascii_case(name))
    }

    /// Picks the mechanism to authenticate with.
    ///
    /// With `requested` set, that mechanism is used only if both sides
    /// support it. Otherwise the first supported mechanism the server offers.
    pub fn select(requested: Option<&str>, offered: &[String]) -> Option<Self> {
        let offers = |mech: &Mechanism| {
            offered
                .iter()
                .any(|name| name.eq_ignore_ascii_case(mech.name()))
        };

        match requested {
            Some(name) => Self::from_name(name).filter(offers),
            None => Self::SUPPORTED.into_iter().find(offers),
        }
    }

    /// Initial client response sent with the AUTHENTICATE command
    pub fn initial_response(&self, user: &str, pass: &str) -> Option<Vec<u8>> {
        match self {
            Mechanism::Plain => {
                let mut message = Vec::with_capacity(user.len() + pass.len() + 2);
                message.push(0);
                message.extend_from_slice(user.as_bytes());
                message.push(0);
                message.extend_from_slice(pass.as_bytes());
                Some(message)
            }
            Mechanism::Login => None,
        }
    }

    /// Answer to the `step`-th server challenge, `None` to cancel
    pub fn respond(&self, step: usize, user: &str, pass: &str) -> Option<Vec<u8>> {
        match (self, step) {
            (Mechanism::Login, 0) => Some(user.as_bytes().to_vec()),
            (Mechanism::Login, 1) => Some(pass.as_bytes().to_vec()),
            // PLAIN with an empty challenge means the initial response was not seen
            (Mechanism::Plain, 0) => self.initial_response(user, pass),
            _ => None,
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
