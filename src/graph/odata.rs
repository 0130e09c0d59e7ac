//! OData query options
//!
//! Builds the `$`-prefixed system query options Graph understands for
//! collection reads.

/// Value of the `ConsistencyLevel` request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    Eventual,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Eventual => "eventual",
        }
    }
}

/// Query options for a collection request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub select: Vec<String>,
    pub expand: Vec<String>,
    pub order_by: Option<String>,
    /// Page size limit; zero means unset
    pub top: u32,
    pub skip: u32,
    pub count: bool,
    pub consistency_level: Option<ConsistencyLevel>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn expand<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    pub fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Query string parameters, in a stable order
    pub fn values(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if self.count {
            params.push(("$count".to_string(), "true".to_string()));
        }
        if !self.expand.is_empty() {
            params.push(("$expand".to_string(), self.expand.join(",")));
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            params.push(("$filter".to_string(), filter.to_string()));
        }
        if let Some(order_by) = self.order_by.as_deref().filter(|o| !o.is_empty()) {
            params.push(("$orderby".to_string(), order_by.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            // Graph expects the search clause quoted
            params.push(("$search".to_string(), format!("\"{}\"", search.trim_matches('"'))));
        }
        if !self.select.is_empty() {
            params.push(("$select".to_string(), self.select.join(",")));
        }
        if self.skip > 0 {
            params.push(("$skip".to_string(), self.skip.to_string()));
        }
        if self.top > 0 {
            params.push(("$top".to_string(), self.top.to_string()));
        }

        params
    }

    /// Request headers implied by the query
    pub fn headers(&self) -> Vec<(String, String)> {
        match self.consistency_level {
            Some(level) => vec![("ConsistencyLevel".to_string(), level.as_str().to_string())],
            None => Vec::new(),
        }
    }
}
