use page_engine::{Compiler, CompilerContext};
use pulldown_cmark::{html as md_html, Options, Parser};

/// Synchronous compiler rendering a text body as CommonMark into `html`.
/// Binary bodies are left uncompiled.
pub fn markdown_compiler() -> Compiler {
    Compiler::sync(|mut ctx: CompilerContext| {
        if let Some(body) = ctx.data.body.as_text() {
            ctx.data.html = Some(render(body));
        }
        Ok(ctx)
    })
}

fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_engine::{process, ProcessOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_commonmark() {
        assert_eq!(render("# Title\n\nSome *text*."), "<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n");
    }

    #[tokio::test]
    async fn compiled_pages_have_excerpts_and_images() {
        let options = ProcessOptions::new()
            .with_images(true)
            .with_compiler(markdown_compiler());
        let record = process(
            "---\ntitle: Post\n---\nFirst paragraph with words.\n\n![alt](pic.png)\n",
            options,
        )
        .await
        .unwrap();

        assert_eq!(record.create_excerpt(None), "First paragraph with words.");
        let images = record.images.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].src.as_deref(), Some("pic.png"));
    }
}
