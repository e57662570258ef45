pub mod aquarea;
