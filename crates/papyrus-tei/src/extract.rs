//! TEI document extraction.
//!
//! Pulls the structured fields out of one GROBID TEI document and
//! synthesizes the markup document stored in `latex_doc`: title, author,
//! and date declarations, an abstract block, one section block per source
//! division (with equation blocks for inline formulas), and a bibliography
//! built from the reference list. Only the title is mandatory; every other
//! field is best-effort.

use papyrus_core::PaperRecord;
use tracing::debug;

use crate::xml::XmlNode;
use crate::{Result, TeiError};

/// Extract a structured record from one TEI-XML document.
pub fn extract_document(input: &str) -> Result<PaperRecord> {
    let root = XmlNode::parse(input)?;
    let header = root.find("teiHeader");

    let title = header
        .and_then(|h| h.find("titleStmt"))
        .and_then(|t| t.find("title"))
        .or_else(|| root.find("title"))
        .map(|t| collapse_whitespace(&t.text_content()))
        .unwrap_or_default();

    if title.is_empty() {
        return Err(TeiError::MissingTitle);
    }

    let mut record = PaperRecord::new(title);
    record.date = header.and_then(extract_date);
    record.authors = header.map(extract_authors).unwrap_or_default();
    record.abstract_text = root
        .find("abstract")
        .map(extract_abstract)
        .filter(|a| !a.is_empty());
    record.keywords = root
        .find("keywords")
        .map(|k| {
            k.find_all("term")
                .iter()
                .map(|t| collapse_whitespace(&t.text_content()))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    record.latex_doc = synthesize_latex(&record, &root);

    debug!(
        title = %record.title,
        authors = record.authors.len(),
        keywords = record.keywords.len(),
        "extracted TEI document"
    );

    Ok(record)
}

/// Publication date: the `when` attribute when present, element text
/// otherwise.
fn extract_date(header: &XmlNode) -> Option<String> {
    let date = header
        .find("publicationStmt")
        .and_then(|p| p.find("date"))
        .or_else(|| header.find("date"))?;

    let value = date
        .attr("when")
        .map(str::to_string)
        .unwrap_or_else(|| collapse_whitespace(&date.text_content()));

    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Authors from the source description, one entry per `author` element with
/// a `persName`, forename(s) and surname in document order.
fn extract_authors(header: &XmlNode) -> Vec<String> {
    let Some(source) = header.find("sourceDesc") else {
        return Vec::new();
    };

    source
        .find_all("author")
        .iter()
        .filter_map(|author| author.find("persName"))
        .map(person_name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// A person name is the forename/surname parts joined in document order.
fn person_name(pers_name: &XmlNode) -> String {
    let parts: Vec<String> = pers_name
        .children
        .iter()
        .filter(|c| c.name == "forename" || c.name == "surname")
        .map(|c| collapse_whitespace(&c.text_content()))
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        collapse_whitespace(&pers_name.text_content())
    } else {
        parts.join(" ")
    }
}

fn extract_abstract(abstract_node: &XmlNode) -> String {
    let paragraphs: Vec<String> = abstract_node
        .find_all("p")
        .iter()
        .map(|p| collapse_whitespace(&p.text_content()))
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        collapse_whitespace(&abstract_node.text_content())
    } else {
        paragraphs.join("\n\n")
    }
}

/// Build the synthesized markup document.
fn synthesize_latex(record: &PaperRecord, root: &XmlNode) -> String {
    let mut doc = String::new();

    doc.push_str(&format!("\\title{{{}}}\n", record.title));
    if !record.authors.is_empty() {
        doc.push_str(&format!("\\author{{{}}}\n", record.authors_joined()));
    }
    if let Some(date) = &record.date {
        doc.push_str(&format!("\\date{{{date}}}\n"));
    }

    if let Some(abstract_text) = &record.abstract_text {
        doc.push_str("\\begin{abstract}\n");
        doc.push_str(abstract_text);
        doc.push_str("\n\\end{abstract}\n");
    }

    if let Some(body) = root.find("body") {
        for div in body.find_all("div") {
            append_section(&mut doc, div);
        }
    }

    if let Some(list_bibl) = root.find("listBibl") {
        let entries: Vec<String> = list_bibl
            .find_all("biblStruct")
            .iter()
            .map(|b| format_reference(b))
            .filter(|e| !e.is_empty())
            .collect();

        if !entries.is_empty() {
            doc.push_str("\\begin{thebibliography}{99}\n");
            for (i, entry) in entries.iter().enumerate() {
                doc.push_str(&format!("\\bibitem{{b{}}} {entry}\n", i + 1));
            }
            doc.push_str("\\end{thebibliography}\n");
        }
    }

    doc
}

/// One section: heading plus its direct paragraphs and formulas in
/// document order. Nested divisions are emitted by the caller as their own
/// sections, so only direct children are taken here.
fn append_section(doc: &mut String, div: &XmlNode) {
    for child in &div.children {
        match child.name.as_str() {
            "head" => {
                let heading = collapse_whitespace(&child.text_content());
                if !heading.is_empty() {
                    doc.push_str(&format!("\\section{{{heading}}}\n"));
                }
            }
            "p" => {
                let text = collapse_whitespace(&child.text_content());
                if !text.is_empty() {
                    doc.push_str(&text);
                    doc.push('\n');
                }
            }
            "formula" => {
                let formula = collapse_whitespace(&child.text_content());
                if !formula.is_empty() {
                    doc.push_str("\\begin{equation}\n");
                    doc.push_str(&formula);
                    doc.push_str("\n\\end{equation}\n");
                }
            }
            _ => {}
        }
    }
}

/// One bibliography entry: authors, title, year, publisher/journal, volume,
/// and pages, omitting absent fields, terminated with a period.
fn format_reference(bibl: &XmlNode) -> String {
    let mut fields: Vec<String> = Vec::new();

    let authors: Vec<String> = bibl
        .find_all("persName")
        .iter()
        .map(|p| person_name(p))
        .filter(|n| !n.is_empty())
        .collect();
    if !authors.is_empty() {
        fields.push(authors.join(", "));
    }

    let analytic_title = bibl
        .find("analytic")
        .and_then(|a| a.find("title"))
        .map(|t| collapse_whitespace(&t.text_content()))
        .filter(|t| !t.is_empty());
    let monogr = bibl.find("monogr");
    let monogr_title = monogr
        .and_then(|m| m.find("title"))
        .map(|t| collapse_whitespace(&t.text_content()))
        .filter(|t| !t.is_empty());

    // The venue is the monograph title when the work itself has an
    // analytic title, otherwise the publisher.
    let (title, venue) = match (analytic_title, monogr_title) {
        (Some(a), m) => (Some(a), m),
        (None, m) => (m, None),
    };
    let publisher = monogr
        .and_then(|m| m.find("publisher"))
        .map(|p| collapse_whitespace(&p.text_content()))
        .filter(|p| !p.is_empty());

    if let Some(title) = title {
        fields.push(title);
    }

    if let Some(year) = bibl.find("date").and_then(reference_year) {
        fields.push(year);
    }

    if let Some(venue) = venue.or(publisher) {
        fields.push(venue);
    }

    for scope in bibl.find_all("biblScope") {
        let value = collapse_whitespace(&scope.text_content());
        match scope.attr("unit") {
            Some("volume") if !value.is_empty() => fields.push(format!("vol. {value}")),
            Some("page") => {
                let pages = match (scope.attr("from"), scope.attr("to")) {
                    (Some(from), Some(to)) => format!("pp. {from}--{to}"),
                    (Some(from), None) => format!("p. {from}"),
                    _ if !value.is_empty() => format!("pp. {value}"),
                    _ => continue,
                };
                fields.push(pages);
            }
            _ => {}
        }
    }

    if fields.is_empty() {
        String::new()
    } else {
        format!("{}.", fields.join(", "))
    }
}

fn reference_year(date: &XmlNode) -> Option<String> {
    let value = date
        .attr("when")
        .map(str::to_string)
        .unwrap_or_else(|| collapse_whitespace(&date.text_content()));

    if value.is_empty() {
        None
    } else {
        // "2023-08-17" style dates reduce to the year
        Some(value.chars().take(4).collect())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt>
        <title>Emergent Geometry</title>
      </titleStmt>
      <publicationStmt>
        <date when="2023-08-17">August 17, 2023</date>
      </publicationStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author>
              <persName><forename>Marcela</forename> <surname>Amaro</surname></persName>
            </author>
          </analytic>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
    <profileDesc>
      <abstract>
        <p>We study emergent geometry from spin networks.</p>
      </abstract>
      <textClass>
        <keywords>
          <term>quantum gravity</term>
          <term>spin networks</term>
        </keywords>
      </textClass>
    </profileDesc>
  </teiHeader>
  <text>
    <body>
      <div>
        <head>Introduction</head>
        <p>Loop variables <ref>1</ref> give a discrete picture.</p>
        <formula>E = h f</formula>
      </div>
    </body>
    <back>
      <div type="references">
        <listBibl>
          <biblStruct>
            <analytic>
              <title>Spin Networks and Quanta</title>
              <author><persName><forename>R.</forename> <surname>Penrose</surname></persName></author>
            </analytic>
            <monogr>
              <title>Journal of Theory</title>
              <imprint>
                <date when="1971"/>
                <biblScope unit="volume">12</biblScope>
                <biblScope unit="page" from="101" to="119"/>
              </imprint>
            </monogr>
          </biblStruct>
        </listBibl>
      </div>
    </back>
  </text>
</TEI>
"#;

    #[test]
    fn extracts_all_fields() {
        let record = extract_document(MINIMAL_TEI).unwrap();
        assert_eq!(record.title, "Emergent Geometry");
        assert_eq!(record.date.as_deref(), Some("2023-08-17"));
        assert_eq!(record.authors, vec!["Marcela Amaro"]);
        assert_eq!(
            record.abstract_text.as_deref(),
            Some("We study emergent geometry from spin networks.")
        );
        assert_eq!(record.keywords, vec!["quantum gravity", "spin networks"]);
    }

    #[test]
    fn latex_doc_blocks_appear_in_order() {
        let record = extract_document(MINIMAL_TEI).unwrap();
        let doc = &record.latex_doc;

        let title = doc.find("\\title{Emergent Geometry}").unwrap();
        let author = doc.find("\\author{Marcela Amaro}").unwrap();
        let date = doc.find("\\date{2023-08-17}").unwrap();
        let abstract_block = doc.find("\\begin{abstract}").unwrap();
        let abstract_text = doc
            .find("We study emergent geometry from spin networks.")
            .unwrap();
        let section = doc.find("\\section{Introduction}").unwrap();
        let paragraph = doc.find("Loop variables 1 give a discrete picture.").unwrap();
        let equation = doc.find("\\begin{equation}\nE = h f\n\\end{equation}").unwrap();
        let bibliography = doc.find("\\begin{thebibliography}").unwrap();

        let mut order = vec![
            title,
            author,
            date,
            abstract_block,
            abstract_text,
            section,
            paragraph,
            equation,
            bibliography,
        ];
        order.dedup();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted, "latex_doc blocks out of order:\n{doc}");
    }

    #[test]
    fn bibliography_entry_is_fielded_and_terminated() {
        let record = extract_document(MINIMAL_TEI).unwrap();
        assert!(record.latex_doc.contains(
            "R. Penrose, Spin Networks and Quanta, 1971, Journal of Theory, vol. 12, pp. 101--119."
        ));
    }

    #[test]
    fn missing_title_fails() {
        let xml = "<TEI><teiHeader><fileDesc><titleStmt><title></title></titleStmt></fileDesc></teiHeader></TEI>";
        assert!(matches!(
            extract_document(xml),
            Err(TeiError::MissingTitle)
        ));

        let xml = "<TEI><text><body><div><p>no header</p></div></body></text></TEI>";
        assert!(matches!(
            extract_document(xml),
            Err(TeiError::MissingTitle)
        ));
    }

    #[test]
    fn absent_optional_fields_do_not_fail() {
        let xml = "<TEI><teiHeader><fileDesc><titleStmt><title>Bare</title></titleStmt></fileDesc></teiHeader></TEI>";
        let record = extract_document(xml).unwrap();
        assert_eq!(record.title, "Bare");
        assert!(record.date.is_none());
        assert!(record.authors.is_empty());
        assert!(record.abstract_text.is_none());
        assert!(record.keywords.is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let a = extract_document(MINIMAL_TEI).unwrap();
        let b = extract_document(MINIMAL_TEI).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn long_title_is_truncated() {
        let long = "word ".repeat(400);
        let xml = format!(
            "<TEI><teiHeader><fileDesc><titleStmt><title>{long}</title></titleStmt></fileDesc></teiHeader></TEI>"
        );
        let record = extract_document(&xml).unwrap();
        assert!(record.title.chars().count() <= PaperRecord::TITLE_CAP);
    }

    #[test]
    fn paragraph_tail_text_after_inline_elements_is_kept() {
        let xml = r#"<TEI><teiHeader><fileDesc><titleStmt><title>T</title></titleStmt></fileDesc></teiHeader>
<text><body><div><head>S</head><p>before <ref>mid</ref> after</p></div></body></text></TEI>"#;
        let record = extract_document(xml).unwrap();
        assert!(record.latex_doc.contains("before mid after"));
    }
}
