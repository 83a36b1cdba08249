/// Generated-name source for one compilation unit.
///
/// Names are `<prefix><stem>_<n>` with a single counter per unit, so two
/// runs over the same tree produce the same names.
#[derive(Clone, Debug)]
pub(crate) struct NameGen {
    prefix: String,
    counter: u32,
}

impl NameGen {
    pub(crate) fn new(prefix: &str) -> NameGen {
        NameGen {
            prefix: prefix.to_string(),
            counter: 0,
        }
    }

    pub(crate) fn next(&mut self, stem: &str) -> String {
        self.counter += 1;
        format!("{}{}_{}", self.prefix, stem, self.counter)
    }

    /// Un-numbered name, for identifiers that may be shadowed safely.
    pub(crate) fn fixed(&self, stem: &str) -> String {
        format!("{}{}", self.prefix, stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_sequential() {
        let mut names = NameGen::new("$");
        assert_eq!(names.next("Next"), "$Next_1");
        assert_eq!(names.next("t"), "$t_2");
        assert_eq!(names.fixed("boundEx"), "$boundEx");
    }
}
