//! Built-in rule table.
//!
//! Entries named after a layout (`recordlist`, `article_block`, ...) cover
//! every listed site that shares that page template. The rest are single
//! sites with a layout of their own.

use crate::rules::{
    DateRule, DomainPolicy, ExtractionRule, Locator, LocatorStrategy as L, PartyRule, ValueSource,
};

use super::{RegistryEntry, SourceGroup};

const LONG_DATE: &str = "%B %d, %Y";

fn member(name: &str, urls: &[&str], rule: ExtractionRule) -> RegistryEntry {
    RegistryEntry::new(name, SourceGroup::Member, urls, rule)
}

fn committee(name: &str, urls: &[&str], rule: ExtractionRule) -> RegistryEntry {
    RegistryEntry::new(name, SourceGroup::Committee, urls, rule)
}

/// Title and link from the same anchor.
fn anchor(items: L, a: L, date: DateRule) -> ExtractionRule {
    ExtractionRule::html(items, Locator::title(a.clone()), Locator::link(a), date)
}

fn text_date(strategy: L, formats: &[&str]) -> DateRule {
    DateRule::new(Locator::text(strategy), formats)
}

/// `<time datetime="2025-01-05">January 5, 2025</time>`
fn time_element_date() -> DateRule {
    DateRule::new(
        Locator::new(L::tag("time"), ValueSource::AttrThenText("datetime".to_string())),
        &["%Y-%m-%d", LONG_DATE],
    )
}

/// Drupal listings where each `h2` headline follows its date.
fn newscontent_rule(formats: &[&str]) -> ExtractionRule {
    ExtractionRule::html(
        L::css("#newscontent h2"),
        Locator::text(L::SelfNode),
        Locator::link(L::tag("a")),
        text_date(L::PreviousSibling, formats),
    )
}

fn article_block(title: &str, date: L) -> ExtractionRule {
    ExtractionRule::html(
        L::css(".ArticleBlock"),
        Locator::title(L::tag(title)),
        Locator::link(L::tag("a")),
        text_date(date, &[LONG_DATE]),
    )
}

pub(super) fn entries() -> Vec<RegistryEntry> {
    vec![
        // ---- Shared layouts ----
        member(
            "recordlist",
            &[
                "https://emmer.house.gov/press-releases?page={page}",
                "https://fitzpatrick.house.gov/press-releases?page={page}",
            ],
            ExtractionRule::html(
                L::css("table.table.recordList tr"),
                Locator::text(L::nth(L::tag("td"), 2)),
                Locator::link(L::css("td a")),
                text_date(L::nth(L::tag("td"), 0), &["%m/%d/%y", LONG_DATE]),
            )
            .skip(1),
        ),
        member(
            "article_block",
            &[
                "https://www.coons.senate.gov/news/press-releases?pagenum_rs={page}",
                "https://www.booker.senate.gov/news/press?pagenum_rs={page}",
                "https://www.cramer.senate.gov/news/press-releases?pagenum_rs={page}",
            ],
            article_block("h3", L::css(".ArticleBlock__date")),
        ),
        member(
            "article_block_h2_date",
            &[
                "https://www.blumenthal.senate.gov/newsroom/press?pagenum_rs={page}",
                "https://www.collins.senate.gov/newsroom/press-releases?pagenum_rs={page}",
                "https://www.hirono.senate.gov/news/press-releases?pagenum_rs={page}",
                "https://www.ernst.senate.gov/news/press-releases?pagenum_rs={page}",
            ],
            article_block("h2", L::tag("p")),
        ),
        member(
            "article_span_published",
            &[
                "https://www.bennet.senate.gov/news/page/{page}",
                "https://www.hickenlooper.senate.gov/press/page/{page}",
            ],
            anchor(
                L::tag("article"),
                L::css("h3 a"),
                text_date(L::css("span.published"), &[LONG_DATE]),
            ),
        ),
        member(
            "document_query",
            &[
                "https://wassermanschultz.house.gov/news/documentquery.aspx?DocumentTypeID=27&Page={page}",
                "https://hern.house.gov/news/documentquery.aspx?DocumentTypeID=27&Page={page}",
                "https://fletcher.house.gov/news/documentquery.aspx?DocumentTypeID=27&Page={page}",
            ],
            anchor(L::tag("article"), L::css("h2 a"), time_element_date()),
        ),
        member(
            "media_body",
            &[
                "https://issa.house.gov/media/press-releases?page={page}",
                "https://tenney.house.gov/media/press-releases?page={page}",
            ],
            anchor(
                L::tag_class("div", "media-body"),
                L::tag("a"),
                text_date(L::css(".row .col-auto"), &["%m/%d/%y", LONG_DATE]),
            ),
        )
        .first_page(0),
        member(
            "senate_drupal",
            &[
                "https://www.hoeven.senate.gov/news/news-releases?PageNum_rs={page}",
                "https://www.murkowski.senate.gov/press/press-releases?PageNum_rs={page}",
                "https://www.republicanleader.senate.gov/newsroom/press-releases?PageNum_rs={page}",
                "https://www.sullivan.senate.gov/newsroom/press-releases?PageNum_rs={page}",
            ],
            newscontent_rule(&["%m.%d.%y", "%m/%d/%y", LONG_DATE]),
        ),
        member(
            "senate_drupal_newscontent",
            &[
                "https://huffman.house.gov/media-center/press-releases?PageNum_rs={page}",
                "https://castro.house.gov/media-center/press-releases?PageNum_rs={page}",
                "https://mikelevin.house.gov/media/press-releases?PageNum_rs={page}",
            ],
            newscontent_rule(&["%m.%d.%y", LONG_DATE]),
        ),
        member(
            "jetlisting_h2",
            &[
                "https://www.lankford.senate.gov/newsroom/press-releases/?jsf=jet-engine:press-list&pagenum={page}",
                "https://www.ricketts.senate.gov/newsroom/press-releases/?jsf=jet-engine:press-list&pagenum={page}",
            ],
            anchor(
                L::css(".jet-listing-grid__item"),
                L::css("h2 a"),
                text_date(L::css("span.elementor-post-info__item--type-date"), &[LONG_DATE]),
            ),
        ),
        member(
            "elementor_post_date",
            &[
                "https://www.sanders.senate.gov/media/press-releases/{page}/",
                "https://www.merkley.senate.gov/news/press-releases/{page}/",
            ],
            ExtractionRule::html(
                L::css(".elementor-post__text"),
                Locator::title(L::tag("h2")),
                Locator::link(L::tag("a")),
                text_date(L::css(".elementor-post-date"), &[LONG_DATE]),
            ),
        ),
        // ---- Single sites ----
        member(
            "crapo",
            &["https://www.crapo.senate.gov/media/newsreleases/?PageNum_rs={page}&"],
            anchor(
                L::tag_class("div", "ArticleBlock"),
                L::tag("a"),
                text_date(L::tag("p"), &["%m.%d.%y", LONG_DATE]),
            ),
        ),
        member(
            "shaheen",
            &["https://www.shaheen.senate.gov/news/press?PageNum_rs={page}"],
            ExtractionRule::html(
                L::tag_class("div", "ArticleBlock"),
                Locator::title(L::css(".ArticleTitle")),
                Locator::link(L::tag("a")),
                text_date(L::tag("time"), &["%m.%d.%y", "%m/%d/%y", LONG_DATE]),
            ),
        ),
        member(
            "timscott",
            &["https://www.scott.senate.gov/media-center/press-releases/jsf/jet-engine:press-list/pagenum/{page}/"],
            anchor(
                L::css(".jet-listing-grid .elementor-widget-wrap"),
                L::css("h3 a"),
                text_date(L::css("li span.elementor-icon-list-text"), &[LONG_DATE]),
            ),
        ),
        member(
            "angusking",
            &["https://www.king.senate.gov/newsroom/press-releases/table?pagenum_rs={page}"],
            anchor(
                L::css("table tr"),
                L::tag("a"),
                text_date(L::nth(L::tag("td"), 0), &["%m/%d/%y"]),
            )
            .skip(1),
        ),
        member(
            "steube",
            &["https://steube.house.gov/category/press-releases/page/{page}/"],
            ExtractionRule::html(
                L::tag_class("article", "item"),
                Locator::title(L::tag("h3")),
                Locator::link(L::tag("a")),
                text_date(L::css("span.date"), &[LONG_DATE]),
            ),
        ),
        member(
            "bera",
            &["https://bera.house.gov/news/documentquery.aspx?DocumentTypeID=2402&Page={page}"],
            anchor(L::tag("article"), L::tag("a"), time_element_date()),
        ),
        member(
            "meeks",
            &["https://meeks.house.gov/media/press-releases?page={page}"],
            anchor(
                L::css(".views-row"),
                L::css("a.h4"),
                text_date(L::css(".evo-card-date"), &[LONG_DATE]),
            )
            .limit(10),
        )
        .first_page(0),
        member(
            "sykes",
            &["https://sykes.house.gov/media/press-releases?PageNum_rs={page}"],
            anchor(
                L::css("table#browser_table tbody tr"),
                L::tag("a"),
                text_date(L::tag("time"), &[LONG_DATE]),
            ),
        ),
        member(
            "barragan",
            &["https://barragan.house.gov/category/news-releases/page/{page}/"],
            ExtractionRule::html(
                L::css(".post"),
                Locator::title(L::tag("h2")),
                Locator::link(L::tag("a")),
                text_date(L::tag("p"), &[LONG_DATE]),
            ),
        ),
        member(
            "castor",
            &["https://castor.house.gov/news/documentquery.aspx?DocumentTypeID=821&Page={page}"],
            anchor(
                L::tag("article"),
                L::tag("a"),
                text_date(L::tag("time"), &[LONG_DATE]),
            ),
        ),
        member(
            "hawley",
            &["https://www.hawley.senate.gov/press-releases/page/{page}/"],
            anchor(
                L::css("article .post"),
                L::css("h2 a"),
                text_date(L::css("span.published"), &[LONG_DATE]),
            ),
        ),
        member(
            "barrasso",
            &["https://www.barrasso.senate.gov/public/index.cfm/news-releases?page={page}"],
            anchor(
                L::css("table tbody tr"),
                L::tag("a"),
                text_date(L::css("td.recordListDate"), &["%m/%d/%y"]),
            ),
        ),
        // ---- Committees and caucus pages ----
        committee(
            "senate_approps_majority",
            &["https://www.appropriations.senate.gov/news/majority?PageNum_rs={page}"],
            newscontent_rule(&["%m.%d.%y"]).with_party(PartyRule::Fixed("majority".to_string())),
        ),
        committee(
            "senate_banking_majority",
            &["https://www.banking.senate.gov/newsroom/majority-press-releases?PageNum_rs={page}"],
            ExtractionRule::html(
                L::css("#browser_table tr"),
                Locator::text(L::nth(L::tag("td"), 2)),
                Locator::link(L::css("td a")),
                text_date(L::nth(L::tag("td"), 0), &["%m/%d/%y"]),
            )
            .with_party(PartyRule::Fixed("majority".to_string())),
        ),
        // Member news for one day; the date is the `Date` query parameter.
        committee(
            "house_gop",
            &["https://www.gop.gov/member-news/"],
            ExtractionRule::html(
                L::css("ul#membernews a"),
                Locator::title(L::SelfNode),
                Locator::link(L::SelfNode),
                DateRule {
                    formats: vec!["%m/%d/%Y".to_string()],
                    ..DateRule::none().from_source_query("Date")
                },
            )
            .with_domain(DomainPolicy::Item),
        ),
    ]
}
