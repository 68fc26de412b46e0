use crate::domain::repositories::MetricTable;
use std::fmt::Write;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML page with one row per metric, ordered by name
pub fn render(metrics: &MetricTable) -> String {
    let mut rows = String::new();
    for (name, value) in metrics {
        // Writing into a String cannot fail
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(name),
            value.kind(),
            value.display_string()
        );
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Metrics</title></head>\n\
         <body>\n<h1>Metrics</h1>\n<table>\n<tr><th>Name</th><th>Kind</th><th>Value</th></tr>\n\
         {rows}</table>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::MetricValue;

    #[test]
    fn test_render_lists_metrics_in_order() {
        let mut metrics = MetricTable::new();
        metrics.insert("PollCount".into(), MetricValue::Counter(15));
        metrics.insert("Alloc".into(), MetricValue::Gauge(12.133));

        let page = render(&metrics);
        let alloc = page.find("<td>Alloc</td>").unwrap();
        let poll = page.find("<td>PollCount</td>").unwrap();
        assert!(alloc < poll);
        assert!(page.contains("<td>12.133</td>"));
        assert!(page.contains("<td>15</td>"));
    }

    #[test]
    fn test_render_escapes_names() {
        let mut metrics = MetricTable::new();
        metrics.insert("<script>".into(), MetricValue::Counter(1));
        assert!(render(&metrics).contains("&lt;script&gt;"));
    }
}
