//! Prompts for vision-model figure analysis and diagram recreation.
//!
//! Every prompt lives here so changing model behaviour means editing one
//! file, and tests can inspect the prompts without a running model.
//!
//! Two kinds of prompt exist:
//!
//! 1. [`DIAGRAM_ANALYSIS_PROMPT`]: sent with the figure image to the
//!    EXTERNAL and LOCAL strategies. Its output contract (one fenced
//!    ```` ```mermaid ```` block, or [`NO_DIAGRAM_MARKER`]) is what
//!    [`crate::pipeline::response`] parses.
//! 2. Recreation prompts: returned to the caller inside each
//!    [`crate::output::DiagramRecord`] so a downstream model can rebuild the
//!    figure from the extracted tokens.

/// Literal marker the model must emit when the image holds no diagram.
pub const NO_DIAGRAM_MARKER: &str = "<!-- No clear diagram detected -->";

/// Fixed analysis prompt sent alongside the figure image.
pub const DIAGRAM_ANALYSIS_PROMPT: &str = r#"You are an expert at analysing diagrams and converting them to Mermaid syntax. Analyse this image and convert any diagram, chart or flowchart it contains to Mermaid syntax.

IMPORTANT INSTRUCTIONS:
- You MUST return only the diagram, inside exactly one markdown code block opened with ```mermaid
- You MUST be accurate and not invent anything that is not clearly visible in the image
- If you cannot see a clear diagram, respond with exactly "<!-- No clear diagram detected -->" and nothing else

Convert the diagram to valid Mermaid syntax and return it in a single ```mermaid code block."#;

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

fn numbers_or(numbers: &[f64], empty: &str) -> String {
    if numbers.is_empty() {
        empty.to_string()
    } else {
        numbers
            .iter()
            .map(|n| format_number(*n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `150.0` → `"150"`, `2.5` → `"2.5"`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn chart_recreation_prompt(data_points: &[f64], labels: &[String], elements: &[String]) -> String {
    let preview: Vec<String> = elements.iter().take(5).cloned().collect();
    format!(
        "Based on the extracted chart data, recreate this chart using an appropriate visualisation:\n\
\n\
Data Points: {}\n\
Labels: {}\n\
Chart Elements: {}\n\
\n\
Produce a Chart.js configuration for the chart. If the data does not suit a chart, \
fall back to a Mermaid diagram or a markdown table holding the same values.",
        numbers_or(data_points, "No numerical data extracted"),
        list_or(labels, "No labels extracted"),
        list_or(&preview, "None detected"),
    )
}

pub fn architecture_recreation_prompt(components: &[String], services: &[String]) -> String {
    format!(
        "Based on the extracted architecture diagram data, recreate this system architecture:\n\
\n\
Components: {}\n\
Services: {}\n\
\n\
Create an architecture diagram in Mermaid syntax that shows:\n\
1. The main components and their relationships\n\
2. Data flow between services\n\
3. External dependencies if any\n\
\n\
Use Mermaid graph syntax with node shapes that distinguish components, services and databases.",
        list_or(components, "None detected"),
        list_or(services, "None detected"),
    )
}

pub fn flowchart_recreation_prompt(
    steps: &[String],
    decision_points: &[String],
    processes: &[String],
) -> String {
    format!(
        "Based on the extracted flowchart data, recreate this process flow:\n\
\n\
Steps: {}\n\
Decision Points: {}\n\
Processes: {}\n\
\n\
Create a flowchart in Mermaid syntax that shows:\n\
1. The sequence of steps\n\
2. Decision points with yes/no branches\n\
3. Process boxes and connectors\n\
\n\
Use rectangles for processes and diamonds for decisions.",
        list_or(steps, "None detected"),
        list_or(decision_points, "None"),
        list_or(processes, "None"),
    )
}

pub fn table_recreation_prompt(caption: &str, elements: &[String]) -> String {
    let caption = if caption.is_empty() { "Table" } else { caption };
    format!(
        "This is an image of a table. Reproduce it carefully and accurately as a markdown table.\n\
\n\
Caption: {}\n\
Extracted text elements: {}\n\
\n\
Use clear column headers and consistent alignment, and represent every value. \
Organise the extracted text into rows and columns where it is tabular.",
        caption,
        list_or(elements, "None detected"),
    )
}

pub fn generic_recreation_prompt(elements: &[String], numbers: &[f64], labels: &[String]) -> String {
    format!(
        "Based on the extracted diagram data, recreate this diagram:\n\
\n\
Text Elements: {}\n\
Numerical Data: {}\n\
Labels: {}\n\
\n\
Use Mermaid syntax if it is a structured diagram, or a markdown table if it holds tabular data. \
Choose the format that best represents the original structure.",
        list_or(elements, "None"),
        numbers_or(numbers, "None"),
        list_or(labels, "None"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_states_output_contract() {
        assert!(DIAGRAM_ANALYSIS_PROMPT.contains("```mermaid"));
        assert!(DIAGRAM_ANALYSIS_PROMPT.contains(NO_DIAGRAM_MARKER));
        assert!(DIAGRAM_ANALYSIS_PROMPT.contains("single"));
    }

    #[test]
    fn format_number_drops_integral_fraction() {
        assert_eq!(format_number(150.0), "150");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn chart_prompt_lists_data_or_placeholder() {
        let p = chart_recreation_prompt(&[150.0], &["Revenue".into()], &[]);
        assert!(p.contains("Data Points: 150"));
        assert!(p.contains("Labels: Revenue"));
        assert!(p.contains("Chart.js"));

        let p = chart_recreation_prompt(&[], &[], &[]);
        assert!(p.contains("No numerical data extracted"));
        assert!(p.contains("No labels extracted"));
    }

    #[test]
    fn table_prompt_defaults_caption() {
        let p = table_recreation_prompt("", &[]);
        assert!(p.contains("Caption: Table"));
        assert!(p.contains("markdown table"));
    }
}
