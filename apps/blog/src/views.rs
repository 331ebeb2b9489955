//! Web interface: note listings by year and month, and single notes.

use serde_json::{Value, json};
use tool_core::{RequestContext, Route, Routes};
use tool_documents::{Document, Stored, default_storage, get_object_or_404};
use tool_shared::{Result, ToolError};
use tool_templating::{Page, as_html};

use crate::bundle::BUNDLE_NAME;
use crate::note::Note;

pub fn routes() -> Routes {
    Routes::namespaced(BUNDLE_NAME)
        .route(
            Route::new("notes", as_html("blog/notes.html", notes))
                .url("/")
                .url("/<int(4):year>/")
                .url("/<int(4):year>/<int(2):month>/"),
        )
        .route(
            Route::new("note", as_html("blog/note.html", note))
                .url("/<int(4):year>/<int(2):month>/<slug>/"),
        )
}

fn note_context(cx: &RequestContext, note: &Stored<Note>) -> Value {
    // notes whose slug does not fit the rule are listed without a link
    let url = note
        .url_args()
        .and_then(|args| cx.url_for(".note", &args).ok());
    json!({
        "pk": note.pk,
        "slug": note.slug,
        "text": note.text,
        "label": note.label(),
        "date": note.date_label(),
        "url": url,
    })
}

async fn notes(cx: RequestContext) -> Result<Page> {
    let store = default_storage(cx.app().context())?;
    let year = cx.args().get_int("year");
    let month = cx.args().get_int("month");

    let mut query = store.query::<Note>().order_by(&["date"], true);
    if let Some(year) = year {
        query = query.filter("date__year", year);
        if let Some(month) = month {
            query = query.filter("date__month", month);
        }
    }
    let notes = query
        .all()
        .await?
        .iter()
        .map(|note| note_context(&cx, note))
        .collect::<Vec<_>>();

    Page::context(json!({ "notes": notes, "year": year, "month": month }))
}

async fn note(cx: RequestContext) -> Result<Page> {
    let args = cx.args();
    let (Some(year), Some(month), Some(slug)) =
        (args.get_int("year"), args.get_int("month"), args.get_str("slug"))
    else {
        return Err(ToolError::not_found());
    };

    let store = default_storage(cx.app().context())?;
    let note = get_object_or_404(
        store
            .query::<Note>()
            .filter("date__year", year)
            .filter("date__month", month)
            .filter("slug", slug),
    )
    .await?;
    Page::context(json!({ "note": note_context(&cx, &note) }))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local};
    use tool_core::debug::Client;

    use crate::test_app;

    #[tokio::test]
    async fn adding_a_note_shows_it_on_the_web() {
        let app = test_app().await;
        let mut client = Client::new(app.clone());
        assert!(client.get("/").await.text_body().contains("There are no notes"));

        app.dispatch(["blog", "add", "hello"]).await.expect("add");
        let listing = client.get("/").await.text_body().into_owned();
        assert!(listing.contains("There are 1 notes"));
        assert!(listing.contains("hello"));

        let today = Local::now().date_naive();
        let url = format!("/{}/{:02}/hello/", today.year(), today.month());
        assert!(listing.contains(&url));

        let detail = client.get(&url).await;
        assert_eq!(detail.status().as_u16(), 200);
        assert!(detail.text_body().contains("hello"));
    }

    #[tokio::test]
    async fn listing_by_year_and_month() {
        let app = test_app().await;
        let mut client = Client::new(app.clone());
        app.dispatch(["blog", "add", "hello"]).await.expect("add");
        app.dispatch(["blog", "add", "ponies"]).await.expect("add");
        assert!(client.get("/").await.text_body().contains("There are 2 notes"));

        let today = Local::now().date_naive();
        let this_month = format!("/{}/{:02}/", today.year(), today.month());
        assert!(client.get(&this_month).await.text_body().contains("There are 2 notes"));
        let this_year = format!("/{}/", today.year());
        assert!(client.get(&this_year).await.text_body().contains("There are 2 notes"));

        let long_ago = client.get("/1999/").await.text_body().into_owned();
        assert!(long_ago.contains("There are no notes"));
    }

    #[tokio::test]
    async fn punctuation_only_notes_are_listed() {
        let app = test_app().await;
        let mut client = Client::new(app.clone());
        app.dispatch(["blog", "add", "!!!"]).await.expect("add");

        let listing = client.get("/").await;
        assert_eq!(listing.status().as_u16(), 200);
        let body = listing.text_body().into_owned();
        assert!(body.contains("There are 1 notes"));

        let today = Local::now().date_naive();
        let url = format!("/{}/{:02}/note/", today.year(), today.month());
        assert!(body.contains(&url));
        assert_eq!(client.get(&url).await.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn unknown_note_is_404() {
        let app = test_app().await;
        let mut client = Client::new(app);
        assert_eq!(client.get("/2010/03/nope/").await.status().as_u16(), 404);
        assert_eq!(client.get("/10/03/").await.status().as_u16(), 404);
    }
}
