use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::DirectoryCount;

pub const TOTAL_LABEL: &str = "total";

const STYLE: &str = r#"
        body {
            font-family: Arial, sans-serif;
            margin: 20px;
            background-color: #f5f5f5;
        }
        h1 {
            color: #333;
            text-align: center;
        }
        .container {
            max-width: 1200px;
            margin: 0 auto;
            background-color: white;
            padding: 20px;
            border-radius: 8px;
            box-shadow: 0 0 10px rgba(0, 0, 0, 0.1);
        }
        .chart-container {
            text-align: center;
            margin: 30px 0;
        }
        table {
            width: 100%;
            border-collapse: collapse;
            margin: 20px 0;
        }
        th, td {
            padding: 12px;
            text-align: left;
            border-bottom: 1px solid #ddd;
        }
        th {
            background-color: #4CAF50;
            color: white;
        }
        tr:hover {
            background-color: #f5f5f5;
        }
        .total-row {
            font-weight: bold;
            background-color: #f2f2f2;
        }
        img {
            max-width: 100%;
            height: auto;
        }"#;

/// Builds the static report page. `rows` are emitted in the order given,
/// followed by the total row; `image_src` is used verbatim as a relative reference.
pub fn render_html(title: &str, rows: &[DirectoryCount], image_src: &str) -> String {
    let total: u64 = rows.iter().map(|r| r.count).sum();
    let title = html_escape::encode_text(title);

    let mut html = String::with_capacity(4096 + rows.len() * 96);
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html lang=\"en\">");
    let _ = writeln!(html, "<head>");
    let _ = writeln!(html, "    <meta charset=\"UTF-8\">");
    let _ = writeln!(
        html,
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    );
    let _ = writeln!(html, "    <title>{title}</title>");
    let _ = writeln!(html, "    <style>{STYLE}\n    </style>");
    let _ = writeln!(html, "</head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "    <div class=\"container\">");
    let _ = writeln!(html, "        <h1>{title}</h1>");
    let _ = writeln!(html, "        <div class=\"chart-container\">");
    let _ = writeln!(html, "            <h2>Markdown files per directory</h2>");
    let _ = writeln!(
        html,
        "            <img src=\"{}\" alt=\"Bar chart of Markdown files per directory\">",
        html_escape::encode_double_quoted_attribute(image_src)
    );
    let _ = writeln!(html, "        </div>");
    let _ = writeln!(html, "        <h2>Details</h2>");
    let _ = writeln!(html, "        <table>");
    let _ = writeln!(html, "            <tr>");
    let _ = writeln!(html, "                <th>Directory</th>");
    let _ = writeln!(html, "                <th>Markdown files</th>");
    let _ = writeln!(html, "            </tr>");
    for row in rows {
        let _ = writeln!(html, "            <tr>");
        let _ = writeln!(
            html,
            "                <td>{}</td>",
            html_escape::encode_text(&row.directory)
        );
        let _ = writeln!(html, "                <td>{}</td>", row.count);
        let _ = writeln!(html, "            </tr>");
    }
    let _ = writeln!(html, "            <tr class=\"total-row\">");
    let _ = writeln!(html, "                <td>{TOTAL_LABEL}</td>");
    let _ = writeln!(html, "                <td>{total}</td>");
    let _ = writeln!(html, "            </tr>");
    let _ = writeln!(html, "        </table>");
    let _ = writeln!(html, "    </div>");
    let _ = writeln!(html, "</body>");
    let _ = writeln!(html, "</html>");
    html
}

pub fn write_html(html: &str, path: &Path) -> Result<()> {
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(d: &str, c: u64) -> DirectoryCount {
        DirectoryCount {
            directory: d.to_string(),
            count: c,
        }
    }

    #[test]
    fn total_row_sums_all_counts_and_comes_last() {
        let html = render_html("Report", &[row("docs", 2), row("(root)", 1)], "chart.png");
        assert!(html.contains("<td>total</td>\n                <td>3</td>"));
        let docs = html.find("<td>docs</td>").expect("docs row");
        let root = html.find("<td>(root)</td>").expect("root row");
        let total = html.find("<tr class=\"total-row\">").expect("total row");
        assert!(docs < root && root < total);
    }

    #[test]
    fn directory_names_and_title_are_escaped() {
        let html = render_html("<Docs & Notes>", &[row("a<b>&c", 1)], "chart.png");
        assert!(html.contains("<title>&lt;Docs &amp; Notes&gt;</title>"));
        assert!(html.contains("<td>a&lt;b&gt;&amp;c</td>"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn image_is_referenced_relatively_and_no_script_is_emitted() {
        let html = render_html("Report", &[row("docs", 1)], "markdown_bar_chart.png");
        assert!(html.contains("<img src=\"markdown_bar_chart.png\""));
        assert!(!html.contains("<script"));
    }
}
