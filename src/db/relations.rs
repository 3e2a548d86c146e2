use rusqlite::{Result, params};
use serde_json::Value;

use super::Db;
use crate::model::default_edge_weight;

/// One stored edge, as loaded for traversal and snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub from_path: String,
    pub to_path: String,
    pub edge_type: String,
    pub weight: f64,
    pub line: Option<usize>,
}

impl Db {
    /// Store a single typed edge. The weight defaults from the per-type
    /// table unless supplied explicitly.
    pub fn store_relationship(
        &self,
        from: &str,
        to: &str,
        edge_type: &str,
        weight: Option<f64>,
        line: Option<usize>,
        details: Option<&Value>,
    ) -> Result<()> {
        let weight = weight.unwrap_or_else(|| default_edge_weight(edge_type));
        self.conn.execute(
            r#"
            INSERT INTO relationships (namespace, from_path, to_path, edge_type, weight, line, details)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                self.namespace,
                from,
                to,
                edge_type,
                weight,
                line.map(|l| l as i64),
                details.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Load every edge in the namespace, optionally restricted to a type
    /// set. The traversal builds its adjacency from this.
    pub fn load_edges(&self, types: Option<&[String]>) -> Result<Vec<EdgeRecord>> {
        let mut query = String::from(
            "SELECT from_path, to_path, edge_type, weight, line FROM relationships WHERE namespace = ?",
        );
        let mut params_vec: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(self.namespace.clone())];

        if let Some(types) = types {
            if types.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; types.len()].join(", ");
            query.push_str(&format!(" AND edge_type IN ({placeholders})"));
            for t in types {
                params_vec.push(rusqlite::types::Value::Text(t.clone()));
            }
        }

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(EdgeRecord {
                from_path: row.get(0)?,
                to_path: row.get(1)?,
                edge_type: row.get(2)?,
                weight: row.get(3)?,
                line: row.get::<_, Option<i64>>(4)?.map(|l| l as usize),
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Edges where the given path is source or target.
    pub fn edges_touching(&self, path: &str) -> Result<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT from_path, to_path, edge_type, weight, line FROM relationships
            WHERE namespace = ? AND (from_path = ? OR to_path = ?)
            "#,
        )?;
        let rows = stmt.query_map(params![self.namespace, path, path], |row| {
            Ok(EdgeRecord {
                from_path: row.get(0)?,
                to_path: row.get(1)?,
                edge_type: row.get(2)?,
                weight: row.get(3)?,
                line: row.get::<_, Option<i64>>(4)?.map(|l| l as usize),
            })
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    pub fn count_relationships(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE namespace = ?",
            params![self.namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_relationship_default_weight() {
        let db = Db::open_in_memory("test", 8).unwrap();
        db.store_relationship("/w/a.js", "/w/b.js", "imports", None, Some(3), None)
            .unwrap();
        db.store_relationship("/w/a.js", "/w/c.js", "depends_on", None, None, None)
            .unwrap();
        db.store_relationship("/w/a.js", "/w/d.js", "calls", Some(0.42), Some(9), None)
            .unwrap();

        let edges = db.load_edges(None).unwrap();
        assert_eq!(edges.len(), 3);

        let imports = edges.iter().find(|e| e.edge_type == "imports").unwrap();
        assert_eq!(imports.weight, 1.0);
        assert_eq!(imports.line, Some(3));

        let depends = edges.iter().find(|e| e.edge_type == "depends_on").unwrap();
        assert_eq!(depends.weight, 0.6);

        let explicit = edges.iter().find(|e| e.edge_type == "calls").unwrap();
        assert_eq!(explicit.weight, 0.42);
    }

    #[test]
    fn test_load_edges_type_filter() {
        let db = Db::open_in_memory("test", 8).unwrap();
        db.store_relationship("/w/a.js", "/w/b.js", "imports", None, None, None)
            .unwrap();
        db.store_relationship("/w/a.js", "/w/b.js", "calls", None, None, None)
            .unwrap();

        let only_imports = db
            .load_edges(Some(&["imports".to_string()]))
            .unwrap();
        assert_eq!(only_imports.len(), 1);
        assert_eq!(only_imports[0].edge_type, "imports");

        let none = db.load_edges(Some(&[])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_edges_touching() {
        let db = Db::open_in_memory("test", 8).unwrap();
        db.store_relationship("/w/a.js", "/w/b.js", "imports", None, None, None)
            .unwrap();
        db.store_relationship("/w/c.js", "/w/a.js", "calls", None, None, None)
            .unwrap();
        db.store_relationship("/w/c.js", "/w/d.js", "calls", None, None, None)
            .unwrap();

        let touching = db.edges_touching("/w/a.js").unwrap();
        assert_eq!(touching.len(), 2);
        assert_eq!(db.count_relationships().unwrap(), 3);
    }
}
