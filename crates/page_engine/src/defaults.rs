use std::path::Path;

use page_logging::page_debug;

use crate::date::{date_from_str, parse_date_str};
use crate::options::ProcessOptions;
use crate::paths;
use crate::slug::{prepare_path_for_slug, slugify};
use crate::stat::StatProvider;
use crate::types::PageRecord;
use crate::value::{Attributes, Value};

/// Turns front matter attributes into a record with every derived field filled in.
///
/// The only suspension point is the modified-time lookup; when it is not
/// needed the future still yields once before completing.
pub async fn apply_defaults(
    mut attributes: Attributes,
    options: &ProcessOptions,
    stat: &dyn StatProvider,
) -> PageRecord {
    for (key, value) in &options.data {
        attributes
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let mut record = PageRecord::new(attributes);
    record.published = record.get("published") != Some(&Value::Bool(false));
    record.categories = categories(record.get("categories"));

    if let Some(filepath) = options.filepath.as_deref() {
        record.filepath = Some(filepath.to_path_buf());
        record.path = Some(match options.root.as_deref() {
            Some(root) if !root.as_os_str().is_empty() => paths::relative(root, filepath),
            _ => filepath.to_path_buf(),
        });
        record.dir = Some(paths::dirname(filepath));
    }

    record.date = match record.get("date") {
        Some(Value::Timestamp(date)) => Some(*date),
        Some(explicit) if explicit.is_truthy() => {
            explicit.to_plain_string().and_then(|s| parse_date_str(&s))
        }
        _ => record
            .path
            .as_deref()
            .and_then(|path| date_from_str(&paths::to_slash(path))),
    };

    let explicit_slug = record
        .get("slug")
        .filter(|value| value.is_truthy())
        .and_then(Value::to_plain_string);
    let slug_source = explicit_slug.or_else(|| {
        record
            .path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
            .map(|path| prepare_path_for_slug(&paths::to_slash(path)))
    });
    record.slug = slug_source.map(|source| slugify(&source, &options.slug));

    let explicit_link = record
        .get("link")
        .filter(|value| value.is_truthy())
        .and_then(Value::to_plain_string);
    record.link = explicit_link.or_else(|| record.slug.clone());
    if let (Some(link), Some(link_it)) = (record.link.as_deref(), options.link_it.as_ref()) {
        if !link.is_empty() {
            record.link = Some(link_it(link));
        }
    }

    if let Some(pre_supplied) = options.stat.clone() {
        if record.date.is_none() && record.filepath.is_some() {
            record.date = pre_supplied.modified;
        }
        record.stat = Some(pre_supplied);
        tokio::task::yield_now().await;
    } else if let (None, Some(filepath)) = (record.date, record.filepath.clone()) {
        fallback_to_mtime(&mut record, &filepath, stat).await;
    } else {
        tokio::task::yield_now().await;
    }

    record
}

async fn fallback_to_mtime(record: &mut PageRecord, filepath: &Path, stat: &dyn StatProvider) {
    match stat.stat(filepath).await {
        Ok(file_stat) => {
            record.date = file_stat.modified;
            record.stat = Some(file_stat);
        }
        Err(err) => {
            page_debug!("no modified time for {}: {}", filepath.display(), err);
        }
    }
}

fn categories(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items.iter().filter_map(Value::to_plain_string).collect(),
        Some(single) if single.is_truthy() => single.to_plain_string().into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use chrono::{Local, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::FileStat;
    use crate::value::Timestamp;

    struct FixedStat(Option<Timestamp>);

    #[async_trait::async_trait]
    impl StatProvider for FixedStat {
        async fn stat(&self, _path: &Path) -> io::Result<FileStat> {
            match self.0 {
                Some(modified) => Ok(FileStat {
                    modified: Some(modified),
                    len: 0,
                }),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "missing")),
            }
        }
    }

    fn local(y: i32, m: u32, d: u32) -> Timestamp {
        Local
            .with_ymd_and_hms(y, m, d, 0, 0, 0)
            .earliest()
            .unwrap()
            .fixed_offset()
    }

    #[tokio::test]
    async fn empty_attributes_get_base_defaults() {
        let record = apply_defaults(Attributes::new(), &ProcessOptions::new(), &FixedStat(None)).await;
        assert!(record.published);
        assert!(record.categories.is_empty());
        assert_eq!(record.date, None);
        assert_eq!(record.slug, None);
        assert_eq!(record.link, None);
        assert_eq!(record.filepath, None);
    }

    #[tokio::test]
    async fn only_literal_false_unpublishes() {
        let mut attributes = Attributes::new();
        attributes.insert("published".into(), Value::from("false"));
        let record = apply_defaults(attributes, &ProcessOptions::new(), &FixedStat(None)).await;
        assert!(record.published);

        let options = ProcessOptions::new().with_data("published", false);
        let record = apply_defaults(Attributes::new(), &options, &FixedStat(None)).await;
        assert!(!record.published);
    }

    #[tokio::test]
    async fn root_makes_path_relative() {
        let options = ProcessOptions::new()
            .with_root("/site/data/")
            .with_filepath("/site/data/2011-01-01-post.md");
        let record = apply_defaults(Attributes::new(), &options, &FixedStat(None)).await;
        assert_eq!(record.path.as_deref(), Some(Path::new("2011-01-01-post.md")));
        assert_eq!(record.dir.as_deref(), Some(Path::new("/site/data")));
        assert_eq!(record.slug.as_deref(), Some("2011-01-01-post"));
        assert_eq!(record.date, Some(local(2011, 1, 1)));
    }

    #[tokio::test]
    async fn empty_filepath_derives_no_slug_or_link() {
        let options = ProcessOptions::new().with_filepath("");
        let record = apply_defaults(Attributes::new(), &options, &FixedStat(None)).await;
        assert_eq!(record.path.as_deref(), Some(Path::new("")));
        assert_eq!(record.slug, None);
        assert_eq!(record.link, None);
    }

    #[tokio::test]
    async fn path_date_beats_modified_time() {
        let options = ProcessOptions::new().with_filepath("2013-03-02-file.md");
        let record =
            apply_defaults(Attributes::new(), &options, &FixedStat(Some(local(2020, 5, 5)))).await;
        assert_eq!(record.date, Some(local(2013, 3, 2)));
        assert_eq!(record.stat, None);
    }

    #[tokio::test]
    async fn modified_time_is_the_last_resort() {
        let options = ProcessOptions::new().with_filepath("notes/file.md");
        let record =
            apply_defaults(Attributes::new(), &options, &FixedStat(Some(local(2020, 5, 5)))).await;
        assert_eq!(record.date, Some(local(2020, 5, 5)));
        assert!(record.stat.is_some());
    }

    #[tokio::test]
    async fn pre_supplied_stat_is_used_instead_of_a_lookup() {
        let stat = FileStat {
            modified: Some(local(2001, 2, 3)),
            len: 42,
        };
        let options = ProcessOptions::new()
            .with_filepath("notes/file.md")
            .with_stat(stat.clone());
        let record =
            apply_defaults(Attributes::new(), &options, &FixedStat(Some(local(2020, 5, 5)))).await;
        assert_eq!(record.date, Some(local(2001, 2, 3)));
        assert_eq!(record.stat, Some(stat));
    }

    #[tokio::test]
    async fn explicit_link_is_transformed() {
        let options = ProcessOptions::new()
            .with_data("link", "about")
            .with_link_it(|link| format!("/{link}/"));
        let record = apply_defaults(Attributes::new(), &options, &FixedStat(None)).await;
        assert_eq!(record.slug, None);
        assert_eq!(record.link.as_deref(), Some("/about/"));
    }

    #[test]
    fn single_category_string_becomes_a_list() {
        assert_eq!(categories(Some(&Value::from("news"))), vec!["news".to_string()]);
        assert_eq!(categories(Some(&Value::Null)), Vec::<String>::new());
    }
}
