/// UML class-diagram modeling rules fed to every AI review prompt.
pub const RULES: &str = "\
1. Una clase por concepto. No dupliques clases que representan la misma entidad del dominio; \
si ya existe una clase con ese nombre, agrega atributos o métodos a ella en lugar de crear otra.\n\
2. Nombres en PascalCase y en singular para clases e interfaces (\"Pedido\", no \"pedidos\"). \
Atributos y métodos en camelCase.\n\
3. Cada atributo lleva visibilidad y tipo: \"+nombre: String\", \"-total: float\". \
Cada método lleva visibilidad, parámetros y tipo de retorno cuando aplique: \"+calcularTotal(): float\".\n\
4. Herencia solo para relaciones \"es un\". Si la relación es \"tiene un\", usa asociación, \
agregación o composición.\n\
5. Composición cuando la parte no existe sin el todo (Pedido ◆-- LíneaDePedido). Agregación \
cuando la parte puede existir por separado (Departamento ◇-- Empleado).\n\
6. La dirección importa: el origen de una herencia es la subclase y el destino la superclase; \
el origen de una composición o agregación es el todo.\n\
7. Las relaciones de herencia no llevan multiplicidad. Asociación, agregación y composición sí: \
usa \"1\", \"0..1\", \"*\" o \"1..*\".\n\
8. Las interfaces no tienen atributos de instancia, solo métodos.\n\
9. No propongas relaciones que ya existen en el diagrama ni atributos que la clase ya tiene.\n\
10. Prefiere pocos cambios concretos a una reorganización completa del diagrama; el autor \
decidió la descomposición existente.";
