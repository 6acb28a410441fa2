//! Template renderer: typed content modules → table-based HTML.
//!
//! The output is a self-contained, inline-styled, table-based document of a
//! fixed logical width — the dialect that survives e-mail clients — suitable
//! as input for [`crate::pipeline::rasterize`]. Each [`Module`] is a
//! discriminated record with a `type` tag; an unknown tag degrades to a
//! raw-HTML passthrough instead of failing the whole render.
//!
//! Module content is trusted input (it comes from the same caller that
//! receives the rendered document); nothing is HTML-escaped here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One typed content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Module {
    /// Image with optional link wrapper.
    Image {
        #[serde(default)]
        src: String,
        #[serde(default)]
        alt: String,
        width: Option<u32>,
        height: Option<u32>,
        link: Option<String>,
        padding: Option<String>,
        background_color: Option<String>,
        style: Option<String>,
    },
    /// Paragraph of text.
    #[serde(alias = "paragraph")]
    Text {
        #[serde(default)]
        content: String,
        color: Option<String>,
        font_size: Option<f32>,
        font_weight: Option<String>,
        align: Option<String>,
        padding: Option<String>,
        line_height: Option<String>,
        background_color: Option<String>,
        style: Option<String>,
    },
    /// Heading, level 1–6.
    Heading {
        #[serde(default)]
        content: String,
        level: Option<u8>,
        font_size: Option<f32>,
        color: Option<String>,
        align: Option<String>,
        padding: Option<String>,
        background_color: Option<String>,
        style: Option<String>,
    },
    /// Horizontal rule.
    Divider {
        color: Option<String>,
        thickness: Option<u32>,
        padding: Option<String>,
    },
    /// Vertical whitespace.
    Spacer { height: Option<u32> },
    /// Multi-column row; each column nests its own module list.
    Row {
        #[serde(default)]
        columns: Vec<Column>,
        background_color: Option<String>,
    },
    /// Literal HTML passthrough. Also the degradation target for unknown
    /// module types.
    RawHtml {
        #[serde(default)]
        html: String,
    },
}

/// One column of a [`Module::Row`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub width_pct: Option<u32>,
    pub valign: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// Parse loosely-typed module records, degrading unknown types to
/// [`Module::RawHtml`] per the renderer contract.
pub fn parse_modules(values: &[Value]) -> Vec<Module> {
    values
        .iter()
        .map(|v| {
            serde_json::from_value::<Module>(v.clone()).unwrap_or_else(|_| Module::RawHtml {
                html: v
                    .get("html")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Render a module list into a complete HTML document of the given width.
pub fn render_modules(modules: &[Module], page_width_px: u32) -> String {
    let rows: Vec<String> = modules
        .iter()
        .map(|m| render_module(m, page_width_px))
        .collect();
    shell(&rows.join("\n"), page_width_px)
}

fn shell(body: &str, width: u32) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <style>\
         body{{margin:0;padding:0;background:#f4f4f4;font-family:Arial,Helvetica,sans-serif;}}\
         img{{border:0;outline:none;text-decoration:none;}}\
         </style>\n\
         </head>\n\
         <body>\n\
         <table role=\"presentation\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" width=\"100%\" style=\"background:#f4f4f4;\">\n\
         <tr><td align=\"center\" style=\"padding:20px 0;\">\n\
         <table role=\"presentation\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" width=\"{width}\" style=\"background:#ffffff;max-width:{width}px;\">\n\
         {body}\n\
         </table>\n\
         </td></tr>\n\
         </table>\n\
         </body>\n\
         </html>"
    )
}

fn render_module(module: &Module, width: u32) -> String {
    match module {
        Module::Image {
            src,
            alt,
            width: img_w,
            height,
            link,
            padding,
            background_color,
            style,
        } => {
            let img_w = img_w.unwrap_or(width);
            let h_attr = height.map(|h| format!(" height=\"{h}\"")).unwrap_or_default();
            let mut img_tag = format!(
                "<img src=\"{src}\" alt=\"{alt}\" width=\"{img_w}\"{h_attr} \
                 style=\"display:block;max-width:100%;height:auto;\">"
            );
            if let Some(link) = link.as_deref().filter(|l| !l.is_empty()) {
                img_tag =
                    format!("<a href=\"{link}\" target=\"_blank\" style=\"display:block;\">{img_tag}</a>");
            }
            let mut td_style = format!("padding:{};", padding.as_deref().unwrap_or("0"));
            push_overrides(&mut td_style, background_color, style);
            format!("<tr><td align=\"center\" style=\"{td_style}\">{img_tag}</td></tr>")
        }

        Module::Text {
            content,
            color,
            font_size,
            font_weight,
            align,
            padding,
            line_height,
            background_color,
            style,
        } => {
            let content = content.replace('\n', "<br>");
            let mut p_style = format!(
                "color:{};font-size:{}px;font-weight:{};text-align:{};line-height:{};padding:{};margin:0;",
                color.as_deref().unwrap_or("#333333"),
                font_size.unwrap_or(14.0),
                font_weight.as_deref().unwrap_or("normal"),
                align.as_deref().unwrap_or("left"),
                line_height.as_deref().unwrap_or("1.5"),
                padding.as_deref().unwrap_or("8px 16px"),
            );
            push_overrides(&mut p_style, background_color, style);
            format!("<tr><td><p style=\"{p_style}\">{content}</p></td></tr>")
        }

        Module::Heading {
            content,
            level,
            font_size,
            color,
            align,
            padding,
            background_color,
            style,
        } => {
            let level = level.unwrap_or(2).clamp(1, 6);
            let default_size = match level {
                1 => 28.0,
                2 => 22.0,
                3 => 18.0,
                4 => 16.0,
                5 => 14.0,
                _ => 12.0,
            };
            let mut h_style = format!(
                "color:{};font-size:{}px;font-weight:bold;text-align:{};padding:{};margin:0;",
                color.as_deref().unwrap_or("#111111"),
                font_size.unwrap_or(default_size),
                align.as_deref().unwrap_or("left"),
                padding.as_deref().unwrap_or("16px 16px 8px"),
            );
            push_overrides(&mut h_style, background_color, style);
            format!("<tr><td><h{level} style=\"{h_style}\">{content}</h{level}></td></tr>")
        }

        Module::Divider {
            color,
            thickness,
            padding,
        } => format!(
            "<tr><td style=\"padding:{};\"><hr style=\"border:0;border-top:{}px solid {};margin:0;\"></td></tr>",
            padding.as_deref().unwrap_or("0 16px"),
            thickness.unwrap_or(1),
            color.as_deref().unwrap_or("#e0e0e0"),
        ),

        Module::Spacer { height } => {
            let h = height.unwrap_or(16);
            format!(
                "<tr><td style=\"height:{h}px;line-height:{h}px;font-size:0;\">&nbsp;</td></tr>"
            )
        }

        Module::Row {
            columns,
            background_color,
        } => {
            if columns.is_empty() {
                return String::new();
            }
            let even_share = 100 / columns.len() as u32;
            let mut cells = String::new();
            for col in columns {
                let pct = col.width_pct.unwrap_or(even_share);
                let col_w = width * pct / 100;
                let inner: Vec<String> = col
                    .modules
                    .iter()
                    .map(|m| render_module(m, col_w))
                    .collect();
                cells.push_str(&format!(
                    "<td width=\"{col_w}\" valign=\"{}\" style=\"padding:0;\">\
                     <table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\">\
                     {}</table></td>",
                    col.valign.as_deref().unwrap_or("top"),
                    inner.join("\n"),
                ));
            }
            let tr_style = background_color
                .as_deref()
                .map(|bg| format!("background-color:{bg};"))
                .unwrap_or_default();
            format!("<tr style=\"{tr_style}\">{cells}</tr>")
        }

        Module::RawHtml { html } => format!("<tr><td>{html}</td></tr>"),
    }
}

fn push_overrides(style: &mut String, background_color: &Option<String>, extra: &Option<String>) {
    if let Some(bg) = background_color.as_deref() {
        style.push_str(&format!("background-color:{bg};"));
    }
    if let Some(s) = extra.as_deref() {
        style.push_str(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_module_renders_with_defaults() {
        let html = render_modules(
            &[Module::Text {
                content: "Hola\nmundo".into(),
                color: None,
                font_size: None,
                font_weight: None,
                align: None,
                padding: None,
                line_height: None,
                background_color: None,
                style: None,
            }],
            600,
        );
        assert!(html.contains("Hola<br>mundo"));
        assert!(html.contains("font-size:14px"));
        assert!(html.contains("width=\"600\""));
    }

    #[test]
    fn unknown_type_degrades_to_raw_passthrough() {
        let values = vec![json!({"type": "holographic", "html": "<b>kept</b>"})];
        let modules = parse_modules(&values);
        assert!(matches!(&modules[0], Module::RawHtml { html } if html == "<b>kept</b>"));

        let html = render_modules(&modules, 600);
        assert!(html.contains("<b>kept</b>"));
    }

    #[test]
    fn paragraph_alias_parses_as_text() {
        let values = vec![json!({"type": "paragraph", "content": "hi"})];
        let modules = parse_modules(&values);
        assert!(matches!(&modules[0], Module::Text { content, .. } if content == "hi"));
    }

    #[test]
    fn heading_level_is_clamped() {
        let html = render_modules(
            &[Module::Heading {
                content: "T".into(),
                level: Some(9),
                font_size: None,
                color: None,
                align: None,
                padding: None,
                background_color: None,
                style: None,
            }],
            600,
        );
        assert!(html.contains("<h6"));
        assert!(html.contains("font-size:12px"));
    }

    #[test]
    fn row_splits_width_between_columns() {
        let col = |m: Vec<Module>| Column {
            width_pct: None,
            valign: None,
            modules: m,
        };
        let html = render_modules(
            &[Module::Row {
                columns: vec![col(vec![]), col(vec![])],
                background_color: None,
            }],
            600,
        );
        assert_eq!(html.matches("<td width=\"300\"").count(), 2);
    }

    #[test]
    fn style_overrides_are_appended() {
        let html = render_modules(
            &[Module::Text {
                content: "x".into(),
                color: None,
                font_size: None,
                font_weight: None,
                align: None,
                padding: None,
                line_height: None,
                background_color: Some("#ff0000".into()),
                style: Some("border:1px solid;".into()),
            }],
            600,
        );
        assert!(html.contains("background-color:#ff0000;border:1px solid;"));
    }
}
