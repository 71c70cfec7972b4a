use crate::plugin::{PageParser, PageTypeId};
use crate::RegistryError;
use std::collections::HashMap;
use std::fmt;

/// Registry of page parsers keyed by page type id
///
/// Built once before the crawl starts, then shared read-only between workers.
#[derive(Default)]
pub struct PageParsers {
    parsers: HashMap<PageTypeId, Box<dyn PageParser>>,
}

/// Description of one registered parser, as listed by [`PageParsers::describe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserInfo {
    pub type_id: PageTypeId,
    pub name: String,
    pub navigation: bool,
    pub parsing: bool,
    pub validation: bool,
}

impl PageParsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parser for a page type
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The parser was registered
    /// * `Err(RegistryError::DuplicateType)` - Another parser already owns the id
    pub fn register<P>(&mut self, type_id: PageTypeId, parser: P) -> Result<(), RegistryError>
    where
        P: PageParser + 'static,
    {
        self.register_boxed(type_id, Box::new(parser))
    }

    pub fn register_boxed(
        &mut self,
        type_id: PageTypeId,
        parser: Box<dyn PageParser>,
    ) -> Result<(), RegistryError> {
        if self.parsers.contains_key(&type_id) {
            return Err(RegistryError::DuplicateType(type_id));
        }
        tracing::debug!("Registered parser '{}' as page type {}", parser.name(), type_id);
        self.parsers.insert(type_id, parser);
        Ok(())
    }

    /// Looks up the parser for a page type
    pub fn resolve(&self, type_id: PageTypeId) -> Result<&dyn PageParser, RegistryError> {
        self.parsers
            .get(&type_id)
            .map(|parser| parser.as_ref())
            .ok_or(RegistryError::UnknownType(type_id))
    }

    pub fn contains(&self, type_id: PageTypeId) -> bool {
        self.parsers.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Lists every registered parser, ordered by type id
    pub fn describe(&self) -> Vec<ParserInfo> {
        let mut infos: Vec<ParserInfo> = self
            .parsers
            .iter()
            .map(|(type_id, parser)| ParserInfo {
                type_id: *type_id,
                name: parser.name().to_string(),
                navigation: parser.supports_navigation(),
                parsing: parser.supports_parsing(),
                validation: parser.supports_validation(),
            })
            .collect();
        infos.sort_by_key(|info| info.type_id);
        infos
    }
}

impl fmt::Debug for PageParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

impl fmt::Display for ParserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool| if on { "yes" } else { "no" };
        write!(
            f,
            "{:>4}  {:<16} navigation: {:<3} parsing: {:<3} validation: {}",
            self.type_id,
            self.name,
            flag(self.navigation),
            flag(self.parsing),
            flag(self.validation)
        )
    }
}
