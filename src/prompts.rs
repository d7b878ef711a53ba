//! Instruction prompt for the LaTeX replica request.
//!
//! Kept in one place so the prompt can be tuned without touching the HTTP
//! client, and so tests can assert on it without a live model.
//!
//! Callers can override it via [`crate::config::PipelineConfig::prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction sent alongside the uploaded PDF.
pub const REPLICA_PROMPT: &str = r#"You are a LaTeX expert. Produce an exact replica of the attached PDF document as LaTeX source.

Follow these rules precisely:

1. ANALYSE THE WHOLE DOCUMENT
   - Every page, including headers and footers
   - Text styling: bold, italics, font sizes, alignment
   - Tables, ordered and unordered lists, and the overall page layout

2. ONE COMPLETE DOCUMENT
   - Output a single, complete .tex file from \documentclass to \end{document}
   - The file must compile directly with pdflatex, without any modification
   - Do not reference external files (images, .bib, custom .sty) that are not
     part of a standard TeX Live installation

3. PACKAGES
   - Use standard packages (geometry, fancyhdr, tabularx, enumitem, xcolor, ...)
     to match margins, running heads, tables and spacing as closely as possible

4. OUTPUT FORMAT
   - Output ONLY the raw LaTeX code
   - Do NOT add explanations, commentary or conversational text
   - Do NOT wrap the code in ```latex fences"#;
