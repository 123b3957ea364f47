use std::collections::HashMap;

use comrak::ComrakOptions;
use rv_core::types::FALLBACK_PAGE_URL;
use rv_core::{ArticleSummary, FetchConfig};
use tera::{Context, Tera, Value};
use url::Url;

pub const PAGE_TITLE: &str = "On-Demand Revalidation";

const TEMPLATE_NAME: &str = "revalidation.html";
const TEMPLATE: &str = include_str!("../templates/revalidation.html");

fn explainer(config: &FetchConfig) -> String {
    let tag = &config.cache_tag;
    let ttl = config.ttl.as_secs();
    format!(
        r#"This page performs a fetch on the server to get a random article from Wikipedia.
The fetched data is then cached with a tag named "{tag}" and a maximum age of {ttl} seconds.

~~~rust
let outcome = fetcher.fetch_summary(&config).await;
// request.directives == {{ tags: ["{tag}"], revalidate: {ttl}s }}
~~~

After the set time has passed, the first request for this page serves the cached article
and refreshes it in the background. Once the refresh lands, subsequent requests get the new article.

Alternatively, if the cache tag is explicitly invalidated with `revalidate_tag("{tag}")`,
any page using that tag is refreshed in the background the next time it is requested.

In real applications tags are invalidated when data changed in an external system, for example
a CMS calling a webhook, or after a mutation made through the site itself.
"#
    )
}

struct MarkdownFilter;

impl tera::Filter for MarkdownFilter {
    fn filter(&self, markdown_source: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        let markdown = markdown_source.as_str().ok_or_else(|| {
            tera::Error::msg("Value passed to markdown filter needs to be a string")
        })?;
        Ok(Value::String(comrak::markdown_to_html(
            markdown,
            &ComrakOptions::default(),
        )))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Only web links are rendered as clickable; anything else points nowhere.
fn link_target(page_url: &str) -> &str {
    match Url::parse(page_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => page_url,
        _ => FALLBACK_PAGE_URL,
    }
}

/// Compiled page templates. Output is HTML-escaped except for the
/// rendered markdown.
pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        tera.register_filter("render_markdown", MarkdownFilter);
        Ok(Self { tera })
    }

    pub fn render(&self, config: &FetchConfig, summary: &ArticleSummary) -> tera::Result<String> {
        let mut context = Context::new();
        context.insert("page_title", PAGE_TITLE);
        context.insert("explainer", &explainer(config));
        context.insert("article", summary);
        context.insert("href", link_target(&summary.page_url));
        self.tera.render(TEMPLATE_NAME, &context)
    }
}
