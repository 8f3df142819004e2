/// Mints ids of the form `<prefix><N>`.
///
/// Seeded from the highest existing `N`, and only ever counts up, so an id
/// is never handed out twice in a session even after its owner is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMint {
    prefix: String,
    next: u64,
}

impl IdMint {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    /// Start after the highest numbered id among `existing`. Ids that don't
    /// carry the prefix (or aren't numbered) are ignored.
    pub fn seeded<'a>(prefix: impl Into<String>, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mint = Self::new(prefix);
        for id in existing {
            mint.observe(id);
        }
        mint
    }

    /// Make sure a future `mint()` won't collide with `id`. An id whose
    /// number has no successor can never be minted, so it is ignored.
    pub fn observe(&mut self, id: &str) {
        if let Some(after) = id
            .strip_prefix(self.prefix.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .and_then(|n| n.checked_add(1))
        {
            self.next = self.next.max(after);
        }
    }

    pub fn peek(&self) -> String {
        format!("{}{}", self.prefix, self.next)
    }

    pub fn mint(&mut self) -> String {
        let id = self.peek();
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one() {
        let mut mint = IdMint::new("tag-");
        assert_eq!(mint.mint(), "tag-1");
        assert_eq!(mint.mint(), "tag-2");
    }

    #[test]
    fn seeded_skips_past_highest() {
        let mint = IdMint::seeded("p", ["p1", "p7", "p3", "x9", "pz"]);
        assert_eq!(mint.peek(), "p8");
    }

    #[test]
    fn observe_never_goes_backwards() {
        let mut mint = IdMint::seeded("u", ["u5"]);
        mint.observe("u2");
        assert_eq!(mint.mint(), "u6");
    }

    #[test]
    fn observe_ignores_largest_number() {
        let mut mint = IdMint::seeded("tag-", ["tag-4"]);
        mint.observe(&format!("tag-{}", u64::MAX));
        assert_eq!(mint.mint(), "tag-5");
    }
}
