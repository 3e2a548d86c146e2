use std::collections::HashMap;

use rusqlite::{Result, params};

use super::{Db, serialize_vector};
use crate::model::CodeRepresentation;

/// Lexical hits score below strong vector hits but keep candidates alive
/// when no embedding is available.
fn lexical_score(matches: usize) -> f64 {
    0.25 + 0.05 * matches.min(5) as f64
}

fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

impl Db {
    /// Hybrid candidate retrieval: vector cosine over augmented embeddings
    /// merged with lexical token matching over path and content. Per-path
    /// the maximum score wins; results are ranked descending.
    pub fn search(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        limit: usize,
    ) -> Result<Vec<CodeRepresentation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: HashMap<String, f64> = HashMap::new();

        if let Some(embedding) = query_embedding
            && !embedding.is_empty()
        {
            let mut padded = embedding.to_vec();
            padded.resize(self.dimensions, 0.0);

            let mut stmt = self.conn.prepare(
                r#"
                SELECT r.path, vec_distance_cosine(v.embedding, ?) as distance
                FROM vec_representations v
                JOIN representations r ON v.rowid = r.id
                WHERE r.namespace = ?
                ORDER BY distance ASC
                LIMIT ?
                "#,
            )?;
            let rows = stmt.query_map(
                params![serialize_vector(&padded), self.namespace, limit as i64],
                |row| {
                    let path: String = row.get(0)?;
                    let distance: f64 = row.get(1)?;
                    Ok((path, 1.0 - distance / 2.0))
                },
            )?;
            for row in rows {
                let (path, similarity) = row?;
                scored.insert(path, similarity);
            }
        }

        let tokens = query_tokens(query);
        if !tokens.is_empty() {
            let mut stmt = self.conn.prepare(
                "SELECT path, content FROM representations WHERE namespace = ?",
            )?;
            let rows = stmt.query_map(params![self.namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (path, content) = row?;
                let haystack = format!("{} {}", path.to_lowercase(), content.to_lowercase());
                let matches = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
                if matches == 0 {
                    continue;
                }
                let score = lexical_score(matches);
                scored
                    .entry(path)
                    .and_modify(|s| *s = s.max(score))
                    .or_insert(score);
            }
        }

        let mut ranked: Vec<(String, f64)> = scored.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(limit);

        let mut results = Vec::with_capacity(ranked.len());
        for (path, _) in ranked {
            if let Some(repr) = self.get_representation(&path)? {
                results.push(repr);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(db: &mut Db, path: &str, content: &str, embedding: Vec<f32>) {
        let mut repr = CodeRepresentation::new(path, content);
        repr.augmented_embedding = embedding;
        db.upsert_representation(&repr).unwrap();
    }

    #[test]
    fn test_vector_search_ranks_by_similarity() {
        let mut db = Db::open_in_memory("test", 4).unwrap();
        store(&mut db, "/w/near.js", "alpha", vec![1.0, 0.0, 0.0, 0.0]);
        store(&mut db, "/w/far.js", "beta", vec![0.0, 1.0, 0.0, 0.0]);

        let results = db
            .search("unrelated", Some(&[1.0, 0.0, 0.0, 0.0]), 5)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "/w/near.js");
    }

    #[test]
    fn test_lexical_fallback_without_embedding() {
        let mut db = Db::open_in_memory("test", 4).unwrap();
        store(&mut db, "/w/auth.js", "function login(user) {}", Vec::new());
        store(&mut db, "/w/math.js", "function add(a, b) {}", Vec::new());

        let results = db.search("login user", None, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/w/auth.js");
    }

    #[test]
    fn test_search_respects_limit_and_handles_empty() {
        let mut db = Db::open_in_memory("test", 4).unwrap();
        for i in 0..5 {
            store(
                &mut db,
                &format!("/w/f{i}.js"),
                "shared keyword here",
                Vec::new(),
            );
        }
        let results = db.search("keyword", None, 3).unwrap();
        assert_eq!(results.len(), 3);

        assert!(db.search("keyword", None, 0).unwrap().is_empty());
        assert!(db.search("zzzznomatch", None, 5).unwrap().is_empty());
    }

    #[test]
    fn test_deleted_path_not_returned() {
        let mut db = Db::open_in_memory("test", 4).unwrap();
        store(&mut db, "/w/gone.js", "unique_marker here", Vec::new());
        assert_eq!(db.search("unique_marker", None, 5).unwrap().len(), 1);

        db.delete_representation("/w/gone.js").unwrap();
        assert!(db.search("unique_marker", None, 5).unwrap().is_empty());
    }
}
