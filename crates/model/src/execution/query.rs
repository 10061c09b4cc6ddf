use crate::execution::connection::ConnectionDescriptor;

/// The (connection, query, session) triple bound to one table cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub connection: Option<ConnectionDescriptor>,
    pub query: String,
    pub session_id: Option<String>,
}

impl QueryState {
    pub fn new(
        connection: Option<ConnectionDescriptor>,
        query: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        QueryState {
            connection,
            query: query.into(),
            session_id,
        }
    }

    /// A binding can only be executed with both a query and somewhere to send it.
    pub fn is_runnable(&self) -> bool {
        self.connection.is_some() && !self.query.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalence_covers_all_components() {
        let conn = ConnectionDescriptor {
            protocol: "postgres".into(),
            host: "localhost".into(),
            ..Default::default()
        };
        let a = QueryState::new(Some(conn.clone()), "SELECT 1", None);
        assert_eq!(a, QueryState::new(Some(conn.clone()), "SELECT 1", None));
        assert_ne!(a, QueryState::new(Some(conn.clone()), "SELECT 2", None));
        assert_ne!(a, QueryState::new(Some(conn), "SELECT 1", Some("s".into())));
        assert_ne!(a, QueryState::new(None, "SELECT 1", None));
    }

    #[test]
    fn test_runnable_requires_query_and_connection() {
        assert!(!QueryState::new(None, "SELECT 1", None).is_runnable());
        assert!(!QueryState::new(Some(Default::default()), "  ", None).is_runnable());
        assert!(QueryState::new(Some(Default::default()), "SELECT 1", None).is_runnable());
    }
}
