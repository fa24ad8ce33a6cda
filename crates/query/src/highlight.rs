//! Hit highlighting
//!
//! Text is cut into windows of about `fragment_chars` characters at whitespace.
//! Each window is run through tantivy's snippet generator for the field; a
//! window scores one point per highlighted match. The best windows (up to
//! `max_snippets`, ties in text order) come back with every match wrapped in
//! the configured tags. Snippet text is HTML-escaped; the tags are not.

use quarry_core::{Document, Field, Highlight, QueryResult};
use quarry_engine::{engine_err, HighlightSettings};
use std::collections::hash_map::{Entry, HashMap};
use tantivy::query::Query as TantivyQuery;
use tantivy::schema::{FieldType, Schema};
use tantivy::{Searcher, SnippetGenerator};

/// Produces highlights for the hits of one search
pub struct Highlighter<'a> {
    searcher: &'a Searcher,
    query: &'a dyn TantivyQuery,
    schema: Schema,
    settings: &'a HighlightSettings,
    generators: HashMap<tantivy::schema::Field, SnippetGenerator>,
}

impl<'a> Highlighter<'a> {
    /// Highlighter for matches of `query`
    pub fn new(
        searcher: &'a Searcher,
        query: &'a dyn TantivyQuery,
        settings: &'a HighlightSettings,
    ) -> Self {
        Highlighter {
            searcher,
            query,
            schema: searcher.schema().clone(),
            settings,
            generators: HashMap::new(),
        }
    }

    /// Highlights for `fields` of a loaded document; `*` means every field on it
    pub fn highlight(&mut self, fields: &[Field], doc: &Document) -> QueryResult<Vec<Highlight>> {
        let targets: Vec<Field> = if fields.iter().any(Field::is_all) {
            doc.field_names()
                .into_iter()
                .map(|name| Field::from(name.to_string()))
                .collect()
        } else {
            fields.to_vec()
        };

        let mut highlights = Vec::new();
        for field in targets {
            let Some(text) = doc.get_str(field.name()) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            let snippets = self.snippets(&field, text)?;
            if let Some(highlight) = Highlight::new(field, snippets) {
                highlights.push(highlight);
            }
        }
        Ok(highlights)
    }

    fn snippets(&mut self, field: &Field, text: &str) -> QueryResult<Vec<String>> {
        let Some(handle) = self.text_field(field) else {
            return Ok(Vec::new());
        };
        let generator = match self.generators.entry(handle) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let generator = SnippetGenerator::create(self.searcher, self.query, handle)
                    .map_err(engine_err("create snippet generator"))?;
                entry.insert(generator)
            }
        };

        let mut scored: Vec<(usize, String)> = Vec::new();
        for window in windows(text, self.settings.fragment_chars) {
            generator.set_max_num_chars(window.chars().count().max(1));
            let snippet = generator.snippet(window);
            let matches = snippet.highlighted().len();
            if matches == 0 {
                continue;
            }
            scored.push((
                matches,
                wrap(
                    snippet.fragment(),
                    snippet.highlighted(),
                    &self.settings.pre_tag,
                    &self.settings.post_tag,
                ),
            ));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.settings.max_snippets);
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    /// Indexed text field handle, or `None` when the field cannot be highlighted
    fn text_field(&self, field: &Field) -> Option<tantivy::schema::Field> {
        let handle = self.schema.get_field(field.name()).ok()?;
        match self.schema.get_field_entry(handle).field_type() {
            FieldType::Str(options) if options.get_indexing_options().is_some() => Some(handle),
            _ => None,
        }
    }
}

/// Split `text` into consecutive windows of about `size` characters, breaking
/// at whitespace when there is any
fn windows(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let cut = match rest.char_indices().nth(size) {
            None => rest.len(),
            Some((hard, _)) => rest[..hard]
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .map(|i| i + rest[i..].chars().next().map_or(1, char::len_utf8))
                .unwrap_or(hard),
        };
        let (head, tail) = rest.split_at(cut);
        if !head.trim().is_empty() {
            out.push(head);
        }
        rest = tail;
    }
    out
}

fn wrap(fragment: &str, ranges: &[std::ops::Range<usize>], pre: &str, post: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + ranges.len() * (pre.len() + post.len()));
    let mut start = 0;
    for range in ranges {
        if range.start < start || range.end > fragment.len() {
            continue;
        }
        escape_into(&mut out, &fragment[start..range.start]);
        out.push_str(pre);
        escape_into(&mut out, &fragment[range.clone()]);
        out.push_str(post);
        start = range.end;
    }
    escape_into(&mut out, &fragment[start..]);
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_break_at_whitespace() {
        let text = "alpha beta gamma delta";
        let parts = windows(text, 12);
        assert_eq!(parts, vec!["alpha beta ", "gamma delta"]);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn windows_hard_cut_without_whitespace() {
        assert_eq!(windows("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn windows_respect_char_boundaries() {
        let text = "ééé ééé";
        assert_eq!(windows(text, 4).concat(), text);
    }

    #[test]
    fn wrap_inserts_tags() {
        let out = wrap("Solr is cool", &[0..4, 8..12], "<b>", "</b>");
        assert_eq!(out, "<b>Solr</b> is <b>cool</b>");
    }

    #[test]
    fn wrap_escapes_text_but_not_tags() {
        let fragment = "<script>alert('x') & \"cool\"</script>";
        let start = fragment.find("cool").unwrap();
        let out = wrap(fragment, &[start..start + 4], "<em>", "</em>");
        assert_eq!(
            out,
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;<em>cool</em>&quot;&lt;&#x2F;script&gt;"
        );
    }
}
