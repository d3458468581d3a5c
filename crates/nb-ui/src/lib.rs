use askama::Template;
use nb_core::models::{Post, PostSummary};

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListTemplate<'a> {
    pub posts: &'a [PostSummary],
    pub title: &'a str,
}

#[derive(Template)]
#[template(path = "write.html")]
pub struct WriteTemplate<'a> {
    pub title: &'a str,
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate<'a> {
    pub post: &'a Post,
    /// Escaped body with line breaks, see `nb_api::handlers`
    pub body_html: &'a str,
    pub title: &'a str,
}
