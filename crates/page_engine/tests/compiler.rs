use std::time::Duration;

use page_engine::{
    process, BoxError, Compiler, CompilerContext, ExcerptOptions, ProcessError, ProcessOptions,
    Value,
};
use pretty_assertions::assert_eq;

const LONG_TEXT: &str = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nunc ut finibus arcu. \
Vestibulum id suscipit mauris. Sed venenatis condimentum lectus, non porta ipsum.</p>\n\
<p>Aliquam erat volutpat.</p>\n";

fn with_long_html() -> Compiler {
    Compiler::sync(|mut ctx: CompilerContext| {
        ctx.data.html = Some(LONG_TEXT.to_string());
        Ok(ctx)
    })
}

fn body_as_html() -> Compiler {
    Compiler::sync(|mut ctx: CompilerContext| {
        ctx.data.html = ctx.data.body.as_text().map(str::to_string);
        Ok(ctx)
    })
}

#[tokio::test]
async fn sync_compiler_sees_body_and_defaults() {
    let compiler = Compiler::sync(|mut ctx: CompilerContext| {
        assert_eq!(ctx.data.body.as_text(), Some("hello"));
        assert_eq!(ctx.data.get("check"), Some(&Value::Bool(true)));
        ctx.data.html = Some("world".to_string());
        Ok(ctx)
    });
    let options = ProcessOptions::new()
        .with_data("check", true)
        .with_compiler(compiler);
    let record = process("hello", options).await.unwrap();
    assert_eq!(record.body.as_text(), Some("hello"));
    assert_eq!(record.get("check"), Some(&Value::Bool(true)));
    assert_eq!(record.html.as_deref(), Some("world"));
}

#[tokio::test]
async fn async_compiler_completes_later() {
    let compiler = Compiler::asynchronous(|mut ctx, done| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ctx.data.html = Some("world".to_string());
            done.done(Ok(ctx));
        });
    });
    let options = ProcessOptions::new()
        .with_data("check", true)
        .with_compiler(compiler);
    let record = process("hello", options).await.unwrap();
    assert_eq!(record.body.as_text(), Some("hello"));
    assert_eq!(record.html.as_deref(), Some("world"));
}

#[tokio::test]
async fn async_compiler_may_finish_on_another_thread() {
    let compiler = Compiler::asynchronous(|mut ctx, done| {
        std::thread::spawn(move || {
            ctx.data.html = Some("threaded".to_string());
            done.done(Ok(ctx));
        });
    });
    let record = process("", ProcessOptions::new().with_compiler(compiler))
        .await
        .unwrap();
    assert_eq!(record.html.as_deref(), Some("threaded"));
}

#[tokio::test]
async fn sync_errors_surface_verbatim() {
    let compiler = Compiler::sync(|_ctx| Err(BoxError::from("test")));
    let err = process("", ProcessOptions::new().with_compiler(compiler))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Compiler(_)));
    assert_eq!(err.to_string(), "test");
}

#[tokio::test]
async fn async_errors_surface_verbatim() {
    let compiler = Compiler::asynchronous(|_ctx, done| {
        tokio::spawn(async move {
            done.done(Err(BoxError::from("test")));
        });
    });
    let err = process("", ProcessOptions::new().with_compiler(compiler))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "test");
}

#[tokio::test]
async fn compiler_can_read_the_options() {
    let compiler = Compiler::sync(|ctx: CompilerContext| {
        if ctx.options.extra.get("test") == Some(&Value::Bool(true)) {
            Ok(ctx)
        } else {
            Err(BoxError::from("missing option"))
        }
    });
    let options = ProcessOptions::new()
        .with_extra("test", true)
        .with_compiler(compiler);
    assert!(process("", options).await.is_ok());
}

#[tokio::test]
async fn excerpt_defaults_to_the_html() {
    let options = ProcessOptions::new().with_compiler(with_long_html());
    let record = process("", options).await.unwrap();
    assert_eq!(
        record.create_excerpt(None),
        "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nunc ut finibus arcu. \
         Vestibulum id suscipit mauris. Sed venenatis condimentum\u{2026}"
    );
}

#[tokio::test]
async fn excerpt_can_be_predefined() {
    let options = ProcessOptions::new().with_compiler(with_long_html());
    let record = process("---\nexcerpt: hello\n---", options).await.unwrap();
    assert_eq!(record.create_excerpt(None), "hello");
}

#[tokio::test]
async fn excerpt_options_per_call_and_configured() {
    let record = process("", ProcessOptions::new().with_compiler(with_long_html()))
        .await
        .unwrap();
    let short = ExcerptOptions {
        prune_length: 6,
        ..ExcerptOptions::default()
    };
    assert_eq!(record.create_excerpt(Some(&short)), "Lorem\u{2026}");

    let options = ProcessOptions::new()
        .with_compiler(with_long_html())
        .with_excerpt(short);
    let record = process("", options).await.unwrap();
    assert_eq!(record.create_excerpt(None), "Lorem\u{2026}");
}

#[tokio::test]
async fn excerpt_without_html_is_empty() {
    let record = process("plain", ProcessOptions::new()).await.unwrap();
    assert_eq!(record.create_excerpt(None), "");
}

#[tokio::test]
async fn images_are_extracted_from_compiled_html() {
    let options = ProcessOptions::new()
        .with_images(true)
        .with_compiler(body_as_html());
    let record = process("<img src=\"hi\">", options).await.unwrap();
    let images = record.images.unwrap();
    assert_eq!(images[0].src.as_deref(), Some("hi"));
}

#[tokio::test]
async fn images_are_skipped_unless_requested() {
    let record = process("<img src=\"hi\">", ProcessOptions::new().with_compiler(body_as_html()))
        .await
        .unwrap();
    assert_eq!(record.images, None);
}

#[tokio::test]
async fn converted_urls_end_up_in_the_html() {
    let options = ProcessOptions::new()
        .with_images(true)
        .with_convert_url(|src, _| format!("/static/{src}"))
        .with_compiler(body_as_html());
    let record = process("<p><img src=\"a.png\"></p>", options)
        .await
        .unwrap();
    assert_eq!(
        record.html.as_deref(),
        Some("<p><img src=\"/static/a.png\"></p>")
    );
    assert_eq!(record.images.unwrap()[0].src.as_deref(), Some("/static/a.png"));
}
